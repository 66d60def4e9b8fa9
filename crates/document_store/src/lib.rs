use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use core_types::{Document, DocumentId};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("`{name}` is not valid UTF-8 text")]
    NotUtf8 { name: String },
}

/// Anything that can be ingested as a document.
pub trait UploadFile {
    fn name(&self) -> &str;
    fn media_type(&self) -> Option<&str>;
    fn read_text(&self) -> Result<String, UploadError>;
}

#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
    media_type: Option<String>,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = guess_media_type(&path).map(str::to_string);
        Self {
            path,
            name,
            media_type,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UploadFile for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    fn read_text(&self) -> Result<String, UploadError> {
        let bytes = fs::read(&self.path).map_err(|source| UploadError::Io {
            path: self.path.clone(),
            source,
        })?;
        String::from_utf8(bytes).map_err(|_| UploadError::NotUtf8 {
            name: self.name.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryFile {
    name: String,
    media_type: Option<String>,
    bytes: Vec<u8>,
}

impl InMemoryFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            media_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }
}

impl UploadFile for InMemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    fn read_text(&self) -> Result<String, UploadError> {
        String::from_utf8(self.bytes.clone()).map_err(|_| UploadError::NotUtf8 {
            name: self.name.clone(),
        })
    }
}

fn guess_media_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let media_type = match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "tsv" => "text/tab-separated-values",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "xml" => "application/xml",
        "yaml" | "yml" => "application/yaml",
        _ => return None,
    };
    Some(media_type)
}

#[derive(Debug)]
pub struct UploadFailure {
    pub name: String,
    pub error: UploadError,
}

#[derive(Debug, Default)]
pub struct UploadReport {
    pub added: Vec<DocumentId>,
    pub failed: Vec<UploadFailure>,
}

/// Session-scoped documents in upload order.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: IndexMap<DocumentId, Document>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, document: Document) -> DocumentId {
        let id = document.id;
        info!(document_id = %id, name = %document.name, bytes = document.content.len(), "indexed document");
        self.documents.insert(id, document);
        id
    }

    /// Ingests every file on its own; one unreadable file does not stop the batch.
    pub fn upload<I, F>(&mut self, files: I) -> UploadReport
    where
        I: IntoIterator<Item = F>,
        F: UploadFile,
    {
        let mut report = UploadReport::default();
        for file in files {
            match file.read_text() {
                Ok(content) => {
                    let document = Document::new(
                        file.name(),
                        content,
                        file.media_type().map(str::to_string),
                    );
                    report.added.push(self.insert(document));
                }
                Err(error) => {
                    warn!(name = %file.name(), error = %error, "skipping unreadable upload");
                    report.failed.push(UploadFailure {
                        name: file.name().to_string(),
                        error,
                    });
                }
            }
        }
        report
    }

    /// Removing an unknown id is a no-op.
    pub fn remove(&mut self, id: &DocumentId) -> Option<Document> {
        let removed = self.documents.shift_remove(id);
        if let Some(document) = &removed {
            info!(document_id = %id, name = %document.name, "removed document");
        }
        removed
    }

    pub fn get(&self, id: &DocumentId) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn upload_keeps_order_and_metadata() {
        let mut store = DocumentStore::new();
        let report = store.upload([
            InMemoryFile::new("a.txt", "alpha"),
            InMemoryFile::new("b.csv", "x,y").with_media_type("text/csv"),
        ]);
        assert_eq!(report.added.len(), 2);
        assert!(report.failed.is_empty());

        let docs: Vec<_> = store.documents().collect();
        assert_eq!(docs[0].name, "a.txt");
        assert_eq!(docs[0].media_type, "text/plain");
        assert_eq!(docs[1].media_type, "text/csv");
        assert_eq!(docs[1].content, "x,y");
    }

    #[test]
    fn bad_file_does_not_block_batch() {
        let mut store = DocumentStore::new();
        let report = store.upload([
            InMemoryFile::new("good.txt", "fine"),
            InMemoryFile::new("bad.bin", vec![0xff, 0xfe, 0x00]),
            InMemoryFile::new("also-good.txt", "fine too"),
        ]);
        assert_eq!(report.added.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].name, "bad.bin");
        assert!(matches!(report.failed[0].error, UploadError::NotUtf8 { .. }));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn remove_is_noop_for_unknown_id() {
        let mut store = DocumentStore::new();
        let first = store.insert(Document::new("one", "1", None));
        let second = store.insert(Document::new("two", "2", None));
        let third = store.insert(Document::new("three", "3", None));

        assert!(store.remove(&DocumentId::new_v4()).is_none());
        assert_eq!(store.len(), 3);

        let removed = store.remove(&second).expect("removed");
        assert_eq!(removed.name, "two");
        let ids: Vec<_> = store.documents().map(|doc| doc.id).collect();
        assert_eq!(ids, vec![first, third]);
        assert!(store.get(&second).is_none());
    }

    #[test]
    fn reads_local_files_and_reports_missing_ones() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("Notes.MD");
        fs::write(&path, "# heading\n\nbody").expect("write file");

        let mut store = DocumentStore::new();
        let report = store.upload([
            LocalFile::new(&path),
            LocalFile::new(dir.path().join("missing.txt")),
        ]);
        assert_eq!(report.added.len(), 1);
        assert!(matches!(report.failed[0].error, UploadError::Io { .. }));

        let doc = store.get(&report.added[0]).expect("document");
        assert_eq!(doc.name, "Notes.MD");
        assert_eq!(doc.media_type, "text/markdown");
    }

    #[test]
    fn unknown_extension_falls_back_to_plain_text() {
        let file = LocalFile::new("/tmp/data.weird");
        assert_eq!(file.media_type(), None);
        let doc = Document::new(file.name(), "", file.media_type().map(str::to_string));
        assert_eq!(doc.media_type, "text/plain");
    }
}
