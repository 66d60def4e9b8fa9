mod actions;
mod conversation;

use std::pin::{Pin, pin};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use core_types::{
    GenerateRequest, Message, MessageId, ProviderAdapter, ProviderConfig, Turn, UnifiedEvent,
    UnifiedEventStream,
};
use document_store::DocumentStore;
use futures::future::{self, Either};
use futures::{Stream, StreamExt};
use retrieval::{ContextAssembler, Retriever};
use tracing::{debug, info, warn};

pub use actions::WorkspaceAction;
pub use conversation::{Conversation, ConversationError, PendingTurn};

pub use core_types::DEFAULT_TEMPERATURE;

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'static>>;

#[derive(Debug, Clone)]
pub struct PreparedTurn {
    pub request: GenerateRequest,
    /// Documents whose segments made it into the context window.
    pub sources: Vec<String>,
}

/// How a turn driven by [`ConversationPipeline::run_turn`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed(MessageId),
    Cancelled(MessageId),
}

impl TurnOutcome {
    pub fn reply_id(self) -> MessageId {
        match self {
            Self::Completed(id) | Self::Cancelled(id) => id,
        }
    }
}

pub struct ReplyStream {
    pub sources: Vec<String>,
    pub fragments: FragmentStream,
}

pub struct ConversationPipeline {
    provider: Arc<dyn ProviderAdapter>,
    retriever: Retriever,
    assembler: ContextAssembler,
    temperature: f32,
}

impl ConversationPipeline {
    pub fn new(provider: Arc<dyn ProviderAdapter>) -> Self {
        Self {
            provider,
            retriever: Retriever::default(),
            assembler: ContextAssembler::default(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = retriever;
        self
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Builds the provider request without touching the network.
    pub fn prepare(
        &self,
        model: &str,
        query: &str,
        history: &[Message],
        store: &DocumentStore,
    ) -> PreparedTurn {
        let retrieval = self.retriever.retrieve(query, store.documents());
        let system_instruction = self.assembler.assemble(&self.retriever.render(&retrieval));

        let mut turns: Vec<Turn> = history
            .iter()
            .filter(|message| !message.text.is_empty())
            .map(Turn::from)
            .collect();
        turns.push(Turn::user(query));

        PreparedTurn {
            request: GenerateRequest {
                model: model.to_string(),
                system_instruction,
                turns,
                temperature: Some(self.temperature),
            },
            sources: retrieval.sources(),
        }
    }

    pub async fn stream_reply(
        &self,
        provider_config: &ProviderConfig,
        api_key: &str,
        query: &str,
        history: &[Message],
        store: &DocumentStore,
    ) -> Result<ReplyStream> {
        let prepared = self.prepare(&provider_config.default_model, query, history, store);
        info!(
            provider = ?provider_config.id,
            model = %prepared.request.model,
            turns = prepared.request.turns.len(),
            sources = prepared.sources.len(),
            "starting reply"
        );
        let events = self
            .provider
            .stream_generate(provider_config, api_key, prepared.request)
            .await?;
        Ok(ReplyStream {
            sources: prepared.sources,
            fragments: text_fragments(events),
        })
    }

    /// Runs one full turn against `conversation`, calling `on_fragment` as text arrives.
    ///
    /// Resolving `cancel` stops consuming the provider stream and keeps the
    /// partial reply as cancelled. On provider failure the partial reply is
    /// kept and marked failed.
    #[allow(clippy::too_many_arguments)]
    pub async fn run_turn<F, C>(
        &self,
        conversation: &mut Conversation,
        store: &DocumentStore,
        provider_config: &ProviderConfig,
        api_key: &str,
        text: &str,
        mut on_fragment: F,
        cancel: C,
    ) -> Result<TurnOutcome, ConversationError>
    where
        F: FnMut(&str),
        C: Future<Output = ()>,
    {
        let turn = conversation.begin_turn(text)?;
        let reply_id = turn.reply_id;

        let reply = match self
            .stream_reply(provider_config, api_key, &turn.query, &turn.history, store)
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                warn!(%reply_id, error = %err, "provider stream failed to open");
                conversation.fail(reply_id)?;
                return Err(ConversationError::Provider(err));
            }
        };
        conversation.set_sources(reply_id, reply.sources)?;

        let mut fragments = reply.fragments;
        let mut cancel = pin!(cancel);
        loop {
            match future::select(fragments.next(), cancel.as_mut()).await {
                Either::Left((Some(Ok(fragment)), _)) => {
                    conversation.append_fragment(reply_id, &fragment)?;
                    on_fragment(&fragment);
                }
                Either::Left((Some(Err(err)), _)) => {
                    warn!(%reply_id, error = %err, "provider stream failed");
                    conversation.fail(reply_id)?;
                    return Err(ConversationError::Provider(err));
                }
                Either::Left((None, _)) => break,
                Either::Right(((), _)) => {
                    info!(%reply_id, "reply cancelled");
                    conversation.cancel(reply_id)?;
                    return Ok(TurnOutcome::Cancelled(reply_id));
                }
            }
        }

        conversation.complete(reply_id)?;
        Ok(TurnOutcome::Completed(reply_id))
    }
}

/// Keeps non-empty text deltas; the first failure ends the stream.
fn text_fragments(events: UnifiedEventStream) -> FragmentStream {
    Box::pin(futures::stream::unfold(Some(events), |state| async move {
        let Some(mut events) = state else {
            return None;
        };
        loop {
            match events.next().await {
                Some(Ok(UnifiedEvent::TextDelta { text })) if !text.is_empty() => {
                    return Some((Ok(text), Some(events)));
                }
                Some(Ok(UnifiedEvent::Usage {
                    input_tokens,
                    output_tokens,
                    total_tokens,
                })) => {
                    debug!(input_tokens, output_tokens, ?total_tokens, "provider usage");
                }
                Some(Ok(UnifiedEvent::Failed { code, message })) => {
                    return Some((Err(anyhow!("provider failed ({code}): {message}")), None));
                }
                Some(Ok(UnifiedEvent::TextDelta { .. })) => {}
                Some(Ok(UnifiedEvent::Completed)) | None => return None,
                Some(Err(err)) => return Some((Err(err), None)),
            }
        }
    }))
}
