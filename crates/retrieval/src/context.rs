use thiserror::Error;

pub const CONTEXT_PLACEHOLDER: &str = "{CONTEXT_WINDOW}";

pub const DEFAULT_INSTRUCTION: &str = "You are DocMind, an advanced Retrieval-Augmented Generation (RAG) platform.

OPERATING MODES:
1. GENERAL CONVERSATION: For greetings, help requests, or questions about your identity, respond politely and professionally. Encourage the user to upload or query documents if they haven't.
2. DATA ANALYSIS: When the user asks about indexed data, prioritize the [RELEVANT_KNOWLEDGE_CHUNKS] provided below.

CONSTRAINTS:
- CITATIONS: Use [File: Name] tags when referencing specific document data.
- ACCURACY: If information is clearly missing from the chunks provided, suggest what documents are available and ask for clarification.
- NO MARKDOWN: Use plain text only. Double line breaks for paragraphs.

[RELEVANT_KNOWLEDGE_CHUNKS]:
{CONTEXT_WINDOW}";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("instruction template must contain {{CONTEXT_WINDOW}} exactly once, found {0}")]
    PlaceholderCount(usize),
}

/// Fills the context window into the instruction template.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    template: String,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            template: DEFAULT_INSTRUCTION.to_string(),
        }
    }
}

impl ContextAssembler {
    pub fn with_template(template: impl Into<String>) -> Result<Self, TemplateError> {
        let template = template.into();
        let count = template.matches(CONTEXT_PLACEHOLDER).count();
        if count != 1 {
            return Err(TemplateError::PlaceholderCount(count));
        }
        Ok(Self { template })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn assemble(&self, context: &str) -> String {
        self.template.replacen(CONTEXT_PLACEHOLDER, context, 1)
    }
}
