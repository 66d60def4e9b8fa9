use crate::RetrievalConfig;

/// Whole-word tokens of already lower-cased text: runs of ASCII
/// alphanumerics and `_`.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
        .collect()
}

pub fn important_terms<'a>(tokens: &[&'a str], min_term_len: usize) -> Vec<&'a str> {
    tokens
        .iter()
        .copied()
        .filter(|token| token.len() > min_term_len)
        .collect()
}

/// Scores a lower-cased segment against lower-cased important terms.
///
/// Each term present adds `match_weight` once plus `frequency_weight` per
/// non-overlapping occurrence.
pub fn score_segment(terms: &[&str], segment: &str, config: &RetrievalConfig) -> f64 {
    terms
        .iter()
        .map(|term| {
            let occurrences = segment.matches(term).count();
            if occurrences == 0 {
                0.0
            } else {
                config.match_weight + occurrences as f64 * config.frequency_weight
            }
        })
        .sum()
}
