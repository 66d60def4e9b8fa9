use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type DocumentId = Uuid;
pub type MessageId = Uuid;
pub type UnifiedEventStream = Pin<Box<dyn Stream<Item = Result<UnifiedEvent>> + Send + 'static>>;

pub const DEFAULT_MEDIA_TYPE: &str = "text/plain";
/// Sampling temperature used when the config does not set one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UiLanguage {
    ZhCn,
    EnUs,
}

/// An uploaded text document. Content never changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub content: String,
    pub media_type: String,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        name: impl Into<String>,
        content: impl Into<String>,
        media_type: Option<String>,
    ) -> Self {
        Self {
            id: DocumentId::new_v4(),
            name: name.into(),
            content: content.into(),
            media_type: media_type
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string()),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Streaming,
    Complete,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    pub status: MessageStatus,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new_v4(),
            role: MessageRole::User,
            text: text.into(),
            created_at: Utc::now(),
            sources: Vec::new(),
            status: MessageStatus::Complete,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new_v4(),
            role: MessageRole::Assistant,
            text: text.into(),
            created_at: Utc::now(),
            sources: Vec::new(),
            status: MessageStatus::Complete,
        }
    }

    /// Empty assistant reply that fragments get appended to.
    pub fn placeholder() -> Self {
        Self {
            status: MessageStatus::Streaming,
            ..Self::assistant(String::new())
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    OpenAi,
    Gemini,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: ProviderId,
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub default_model: String,
    #[serde(default)]
    pub extra_headers: Vec<(String, String)>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
        }
    }
}

impl From<&Message> for Turn {
    fn from(message: &Message) -> Self {
        match message.role {
            MessageRole::User => Turn::user(message.text.clone()),
            MessageRole::Assistant => Turn::assistant(message.text.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub system_instruction: String,
    pub turns: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnifiedEvent {
    TextDelta {
        text: String,
    },
    Usage {
        input_tokens: u64,
        output_tokens: u64,
        total_tokens: Option<u64>,
    },
    Completed,
    Failed {
        code: String,
        message: String,
    },
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Opens a streaming generation. Events are yielded as the provider sends them.
    async fn stream_generate(
        &self,
        provider: &ProviderConfig,
        api_key: &str,
        request: GenerateRequest,
    ) -> Result<UnifiedEventStream>;
}
