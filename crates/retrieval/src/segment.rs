use core_types::Document;

/// A paragraph of a document, borrowed for the duration of one retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub content: &'a str,
    pub source: &'a str,
}

/// Splits text wherever two or more line breaks run together.
///
/// A `\r` directly before `\n` counts as part of the break. Returned
/// segments are trimmed and never empty.
pub fn segment_text(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\n' {
            i += 1;
            continue;
        }

        let mut end = i;
        let mut breaks = 0;
        while end < bytes.len() {
            match bytes[end] {
                b'\n' => breaks += 1,
                b'\r' if bytes.get(end + 1) == Some(&b'\n') => {}
                _ => break,
            }
            end += 1;
        }

        if breaks >= 2 {
            push_trimmed(&mut segments, &text[start..i]);
            start = end;
        }
        i = end;
    }
    push_trimmed(&mut segments, &text[start..]);

    segments
}

pub fn segment_document(document: &Document) -> impl Iterator<Item = Segment<'_>> {
    segment_text(&document.content)
        .into_iter()
        .map(|content| Segment {
            content,
            source: &document.name,
        })
}

fn push_trimmed<'a>(segments: &mut Vec<&'a str>, raw: &'a str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed);
    }
}
