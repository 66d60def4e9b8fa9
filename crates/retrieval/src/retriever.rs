use core_types::Document;
use tracing::debug;

use crate::RetrievalConfig;
use crate::score::{important_terms, score_segment, tokenize};
use crate::segment::segment_document;

pub const EMPTY_WORKSPACE_CONTEXT: &str = "WORKSPACE_EMPTY: No documents have been indexed yet. Remind the user to plant some 'seeds' (upload files).";
pub const SOURCE_TAG_PREFIX: &str = "[SOURCE: ";

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub content: String,
    pub source: String,
    pub score: f64,
}

/// Outcome of one retrieval call, before rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    EmptyWorkspace,
    /// Ranked best first, never empty.
    Matches(Vec<ScoredChunk>),
    General { documents: Vec<String> },
    LowRelevance { documents: Vec<String> },
}

impl Retrieval {
    /// Distinct document names of the matched chunks, in rank order.
    pub fn sources(&self) -> Vec<String> {
        let Retrieval::Matches(chunks) = self else {
            return Vec::new();
        };
        let mut sources: Vec<String> = Vec::new();
        for chunk in chunks {
            if !sources.contains(&chunk.source) {
                sources.push(chunk.source.clone());
            }
        }
        sources
    }
}

#[derive(Debug, Clone, Default)]
pub struct Retriever {
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(mut config: RetrievalConfig) -> Self {
        config.top_k = config.top_k.max(1);
        for term in &mut config.general_terms {
            *term = term.to_lowercase();
        }
        Self { config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn retrieve<'a, I>(&self, query: &str, documents: I) -> Retrieval
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let documents: Vec<&Document> = documents.into_iter().collect();
        if documents.is_empty() {
            return Retrieval::EmptyWorkspace;
        }

        let query = query.to_lowercase();
        let tokens = tokenize(&query);
        let terms = important_terms(&tokens, self.config.min_term_len);
        let is_general = tokens.len() < self.config.general_token_threshold
            || tokens
                .iter()
                .any(|token| self.config.general_terms.iter().any(|term| term == token));

        let mut candidates = Vec::new();
        if !terms.is_empty() {
            for document in &documents {
                for segment in segment_document(document) {
                    let score =
                        score_segment(&terms, &segment.content.to_lowercase(), &self.config);
                    if score > 0.0 {
                        candidates.push(ScoredChunk {
                            content: segment.content.to_string(),
                            source: segment.source.to_string(),
                            score,
                        });
                    }
                }
            }
        }

        let candidate_count = candidates.len();
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(self.config.top_k);
        debug!(
            documents = documents.len(),
            terms = terms.len(),
            candidates = candidate_count,
            selected = candidates.len(),
            is_general,
            "ranked segments"
        );

        if !candidates.is_empty() {
            return Retrieval::Matches(candidates);
        }

        let names = documents.iter().map(|doc| doc.name.clone()).collect();
        if is_general {
            Retrieval::General { documents: names }
        } else {
            Retrieval::LowRelevance { documents: names }
        }
    }

    pub fn render(&self, retrieval: &Retrieval) -> String {
        match retrieval {
            Retrieval::EmptyWorkspace => EMPTY_WORKSPACE_CONTEXT.to_string(),
            Retrieval::Matches(chunks) => chunks
                .iter()
                .map(|chunk| format!("{SOURCE_TAG_PREFIX}{}]\n{}", chunk.source, chunk.content))
                .collect::<Vec<_>>()
                .join(&self.config.chunk_separator),
            Retrieval::General { documents } => format!(
                "GENERAL_QUERY: The user is engaging in general conversation. Currently indexed documents: {}.",
                documents.join(", ")
            ),
            Retrieval::LowRelevance { documents } => format!(
                "LOW_RELEVANCE: No direct segments matched the query keywords. Available files in index: {}. Provide a high-level response if possible or ask for more specific keywords.",
                documents.join(", ")
            ),
        }
    }

    /// Retrieves and renders in one step.
    pub fn context<'a, I>(&self, query: &str, documents: I) -> String
    where
        I: IntoIterator<Item = &'a Document>,
    {
        self.render(&self.retrieve(query, documents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, content: &str) -> Document {
        Document::new(name, content, None)
    }

    fn retriever() -> Retriever {
        Retriever::new(RetrievalConfig::default())
    }

    #[test]
    fn empty_workspace_returns_sentinel_for_any_query() {
        let retriever = retriever();
        let docs: Vec<Document> = Vec::new();
        for query in ["hello", "", "quarterly revenue in quebec"] {
            assert_eq!(retriever.context(query, &docs), EMPTY_WORKSPACE_CONTEXT);
        }
    }

    #[test]
    fn matching_segment_is_tagged_with_source() {
        let docs = vec![doc("A.txt", "Revenue grew substantially in Quebec.")];
        let context = retriever().context("revenue", &docs);
        assert!(context.contains("[SOURCE: A.txt]"));
        assert!(context.contains("Revenue grew substantially in Quebec."));
    }

    #[test]
    fn unmatched_specific_query_reports_low_relevance() {
        let docs = vec![doc("B.txt", "Lorem ipsum dolor sit amet.")];
        let context = retriever().context("quarterly xyz123 figures overview", &docs);
        assert!(context.starts_with("LOW_RELEVANCE:"));
        assert!(context.contains("B.txt"));
    }

    #[test]
    fn single_unmatched_token_is_general() {
        let docs = vec![doc("B.txt", "Lorem ipsum dolor sit amet.")];
        assert_eq!(
            retriever().retrieve("xyz123", &docs),
            Retrieval::General {
                documents: vec!["B.txt".to_string()]
            }
        );
    }

    #[test]
    fn greeting_reports_general_query() {
        let docs = vec![doc("C.txt", "Anything at all.")];
        let context = retriever().context("hi", &docs);
        assert!(context.starts_with("GENERAL_QUERY:"));
        assert!(context.contains("C.txt"));
    }

    #[test]
    fn long_question_with_stop_word_and_no_match_is_general() {
        let docs = vec![doc("C.txt", "Anything at all.")];
        let retrieval = retriever().retrieve("what is the budget forecast for march", &docs);
        assert!(matches!(retrieval, Retrieval::General { .. }));
    }

    #[test]
    fn long_question_without_stop_word_is_low_relevance() {
        let docs = vec![doc("C.txt", "Anything at all.")];
        let retrieval = retriever().retrieve("list the budget forecast for march", &docs);
        assert_eq!(
            retrieval,
            Retrieval::LowRelevance {
                documents: vec!["C.txt".to_string()]
            }
        );
    }

    #[test]
    fn positive_match_wins_over_general_classification() {
        let docs = vec![doc("A.txt", "Hello there. Revenue is up.")];
        let retrieval = retriever().retrieve("hello revenue", &docs);
        assert!(matches!(retrieval, Retrieval::Matches(_)));
    }

    #[test]
    fn ranks_by_score_and_caps_at_top_k() {
        let content = (0..12)
            .map(|i| "data ".repeat(i + 1))
            .collect::<Vec<_>>()
            .join("\n\n");
        let docs = vec![doc("many.txt", &content)];
        let Retrieval::Matches(chunks) = retriever().retrieve("data", &docs) else {
            panic!("expected matches");
        };
        assert_eq!(chunks.len(), 8);
        assert!(chunks.windows(2).all(|pair| pair[0].score >= pair[1].score));
        assert_eq!(chunks[0].content, "data ".repeat(12).trim());
    }

    #[test]
    fn ties_keep_insertion_order() {
        let docs = vec![
            doc("first.txt", "budget line"),
            doc("second.txt", "budget line"),
        ];
        let Retrieval::Matches(chunks) = retriever().retrieve("budget", &docs) else {
            panic!("expected matches");
        };
        assert_eq!(chunks[0].source, "first.txt");
        assert_eq!(chunks[1].source, "second.txt");

        let swapped = vec![docs[1].clone(), docs[0].clone()];
        let Retrieval::Matches(chunks) = retriever().retrieve("budget", &swapped) else {
            panic!("expected matches");
        };
        assert_eq!(chunks[0].source, "second.txt");
    }

    #[test]
    fn renders_chunks_with_separator() {
        let docs = vec![doc("A.txt", "alpha budget\n\nbeta budget budget")];
        let context = retriever().context("budget", &docs);
        assert_eq!(
            context,
            "[SOURCE: A.txt]\nbeta budget budget\n\n---\n\n[SOURCE: A.txt]\nalpha budget"
        );
    }

    #[test]
    fn retrieval_is_idempotent() {
        let docs = vec![
            doc("A.txt", "Revenue grew.\n\nCosts fell."),
            doc("B.txt", "Revenue targets for next year."),
        ];
        let retriever = retriever();
        assert_eq!(
            retriever.context("revenue targets", &docs),
            retriever.context("revenue targets", &docs)
        );
    }

    #[test]
    fn sources_are_distinct_in_rank_order() {
        let docs = vec![
            doc("A.txt", "budget\n\nbudget budget"),
            doc("B.txt", "budget budget budget"),
        ];
        let retrieval = retriever().retrieve("budget", &docs);
        assert_eq!(retrieval.sources(), vec!["B.txt", "A.txt"]);
        assert!(Retrieval::EmptyWorkspace.sources().is_empty());
    }

    #[test]
    fn custom_config_changes_limits() {
        let config = RetrievalConfig {
            top_k: 1,
            min_term_len: 1,
            ..RetrievalConfig::default()
        };
        let docs = vec![doc("A.txt", "tax\n\ntax tax")];
        let Retrieval::Matches(chunks) = Retriever::new(config).retrieve("tax", &docs) else {
            panic!("expected matches");
        };
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "tax tax");
    }

    #[test]
    fn zero_top_k_still_keeps_best_segment() {
        let config = RetrievalConfig {
            top_k: 0,
            ..RetrievalConfig::default()
        };
        let retriever = Retriever::new(config);
        assert_eq!(retriever.config().top_k, 1);
        let docs = vec![doc("A.txt", "budget\n\nbudget budget")];
        let Retrieval::Matches(chunks) = retriever.retrieve("budget", &docs) else {
            panic!("expected matches");
        };
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn malformed_content_never_panics() {
        let docs = vec![
            doc("empty.txt", ""),
            doc("blank.txt", "\n\n\n\n"),
            doc("binaryish.txt", "\u{0}\u{fffd}\r\r\n\n\u{200b}"),
        ];
        let context = retriever().context("anything relevant here", &docs);
        assert!(!context.is_empty());
    }
}
