//! Lexical retrieval over uploaded documents.
//!
//! Documents are split into paragraph segments, each segment is scored by
//! term overlap with the query, and the best segments are rendered into the
//! context window handed to the language model. When nothing matches, a
//! sentinel string describing the workspace is produced instead, so the
//! retriever always has something to say.

mod context;
mod retriever;
mod score;
mod segment;

use serde::{Deserialize, Serialize};

pub use context::{CONTEXT_PLACEHOLDER, ContextAssembler, DEFAULT_INSTRUCTION, TemplateError};
pub use retriever::{
    EMPTY_WORKSPACE_CONTEXT, Retrieval, Retriever, SOURCE_TAG_PREFIX, ScoredChunk,
};
pub use score::{important_terms, score_segment, tokenize};
pub use segment::{Segment, segment_document, segment_text};

/// Tunables for segment scoring and fallback classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Query terms must be strictly longer than this to count.
    pub min_term_len: usize,
    pub match_weight: f64,
    pub frequency_weight: f64,
    /// Maximum segments kept. [`Retriever::new`] raises 0 to 1.
    pub top_k: usize,
    /// Queries with fewer tokens than this are treated as conversational.
    pub general_token_threshold: usize,
    pub general_terms: Vec<String>,
    pub chunk_separator: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_term_len: 3,
            match_weight: 2.0,
            frequency_weight: 0.5,
            top_k: 8,
            general_token_threshold: 4,
            general_terms: ["hi", "hello", "hey", "who", "what", "you", "help", "docmind"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            chunk_separator: "\n\n---\n\n".to_string(),
        }
    }
}
