use core_types::{Message, MessageId, MessageStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("a reply is already being generated")]
    Busy,
    #[error("message text is empty")]
    EmptyMessage,
    #[error("message {0} is not the reply in flight")]
    NotInFlight(MessageId),
    #[error(transparent)]
    Provider(anyhow::Error),
}

/// Snapshot handed out when a turn starts.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub query: String,
    /// Messages that preceded the new user message.
    pub history: Vec<Message>,
    pub user_id: MessageId,
    pub reply_id: MessageId,
}

/// Ordered chat history with at most one reply streaming at a time.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    in_flight: Option<MessageId>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_welcome(text: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::assistant(text)],
            in_flight: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn in_flight(&self) -> Option<MessageId> {
        self.in_flight
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Appends the user message and an empty streaming reply.
    pub fn begin_turn(&mut self, text: &str) -> Result<PendingTurn, ConversationError> {
        if self.in_flight.is_some() {
            return Err(ConversationError::Busy);
        }
        if text.trim().is_empty() {
            return Err(ConversationError::EmptyMessage);
        }

        let history = self.messages.clone();
        let user = Message::user(text);
        let reply = Message::placeholder();
        let turn = PendingTurn {
            query: text.to_string(),
            history,
            user_id: user.id,
            reply_id: reply.id,
        };
        self.messages.push(user);
        self.messages.push(reply);
        self.in_flight = Some(turn.reply_id);
        Ok(turn)
    }

    pub fn append_fragment(
        &mut self,
        reply_id: MessageId,
        fragment: &str,
    ) -> Result<(), ConversationError> {
        self.reply_mut(reply_id)?.text.push_str(fragment);
        Ok(())
    }

    pub fn set_sources(
        &mut self,
        reply_id: MessageId,
        sources: Vec<String>,
    ) -> Result<(), ConversationError> {
        self.reply_mut(reply_id)?.sources = sources;
        Ok(())
    }

    pub fn complete(&mut self, reply_id: MessageId) -> Result<(), ConversationError> {
        self.finish(reply_id, MessageStatus::Complete)
    }

    /// The consumer stopped reading; whatever arrived is kept.
    pub fn cancel(&mut self, reply_id: MessageId) -> Result<(), ConversationError> {
        self.finish(reply_id, MessageStatus::Cancelled)
    }

    pub fn fail(&mut self, reply_id: MessageId) -> Result<(), ConversationError> {
        self.finish(reply_id, MessageStatus::Failed)
    }

    fn finish(&mut self, reply_id: MessageId, status: MessageStatus) -> Result<(), ConversationError> {
        self.reply_mut(reply_id)?.status = status;
        self.in_flight = None;
        Ok(())
    }

    fn reply_mut(&mut self, reply_id: MessageId) -> Result<&mut Message, ConversationError> {
        if self.in_flight != Some(reply_id) {
            return Err(ConversationError::NotInFlight(reply_id));
        }
        self.messages
            .iter_mut()
            .rev()
            .find(|message| message.id == reply_id)
            .ok_or(ConversationError::NotInFlight(reply_id))
    }
}
