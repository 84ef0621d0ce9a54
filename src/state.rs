//! Conversation state threaded through every node of a turn.
//!
//! State is split by lifetime:
//!
//! - the **message** and **error** channels are durable and checkpointed;
//! - the **session identifiers** are immutable for the life of a thread and
//!   checkpointed so resume can verify them;
//! - the **watermark** is durable: it is the low-water mark for "new"
//!   incoming messages on the next turn;
//! - the **persona** prompt/tool list and **model parameters** are supplied
//!   fresh on every invocation and are never restored from a checkpoint
//!   (personas and back-ends may change between turns).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    channels::{Channel, ErrorsChannel, MessagesChannel},
    message::Message,
    providers::ModelParams,
};

/// Immutable identifiers naming the console conversation this thread serves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub protocol_number: String,
    pub attendance_id: String,
    pub contact_id: String,
    /// Origin URL of the host platform the context providers read from.
    pub base_url: String,
}

/// Persona configuration for one invocation.
///
/// `persona_id` is persisted so a switch between turns is detectable; the
/// prompt and tool list are per-invocation input, never restored.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PersonaConfig {
    pub persona_id: String,
    pub system_prompt: String,
    pub available_tools: Vec<String>,
}

/// The state record flowing through the turn graph.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationState {
    /// Conversation history. Append-only within a turn.
    pub messages: MessagesChannel,
    /// Recoverable error events recorded along the way.
    pub errors: ErrorsChannel,
    /// Immutable session identifiers.
    pub session: SessionContext,
    /// Active persona. Prompt and tool list are per-invocation.
    pub persona: PersonaConfig,
    /// Model-selection parameters; absent on a state restored from a
    /// checkpoint until the runner hydrates it with the turn's values.
    pub model: Option<ModelParams>,
    /// Timestamp of the last externally sourced message already folded into
    /// context. `None` until the first context injection.
    pub watermark: Option<DateTime<Utc>>,
}

/// Immutable snapshot handed to nodes during execution.
#[derive(Clone, Debug)]
pub struct StateSnapshot {
    pub messages: Vec<Message>,
    pub messages_version: u32,
    pub errors_version: u32,
    pub session: SessionContext,
    pub persona: PersonaConfig,
    pub model: Option<ModelParams>,
    pub watermark: Option<DateTime<Utc>>,
}

impl StateSnapshot {
    /// Borrow the newest message, if any.
    #[must_use]
    pub fn latest_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

impl ConversationState {
    /// Fresh state for a thread with no history.
    #[must_use]
    pub fn new(session: SessionContext, persona: PersonaConfig, model: ModelParams) -> Self {
        Self {
            messages: MessagesChannel::default(),
            errors: ErrorsChannel::default(),
            session,
            persona,
            model: Some(model),
            watermark: None,
        }
    }

    #[must_use]
    pub fn builder(session: SessionContext) -> ConversationStateBuilder {
        ConversationStateBuilder::new(session)
    }

    /// Append a message. The version is not bumped here; that is the
    /// reducer registry's job when a node partial lands.
    pub fn push_message(&mut self, message: Message) -> &mut Self {
        self.messages.get_mut().push(message);
        self
    }

    /// Point-in-time view for node execution.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            messages: self.messages.snapshot(),
            messages_version: self.messages.version(),
            errors_version: self.errors.version(),
            session: self.session.clone(),
            persona: self.persona.clone(),
            model: self.model.clone(),
            watermark: self.watermark,
        }
    }
}

/// Fluent constructor for states with preexisting history, used by tests
/// and by checkpoint restoration.
#[derive(Debug)]
pub struct ConversationStateBuilder {
    session: SessionContext,
    persona: PersonaConfig,
    model: Option<ModelParams>,
    messages: Vec<Message>,
    watermark: Option<DateTime<Utc>>,
}

impl ConversationStateBuilder {
    fn new(session: SessionContext) -> Self {
        Self {
            session,
            persona: PersonaConfig::default(),
            model: None,
            messages: Vec::new(),
            watermark: None,
        }
    }

    #[must_use]
    pub fn with_persona(mut self, persona: PersonaConfig) -> Self {
        self.persona = persona;
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: ModelParams) -> Self {
        self.model = Some(model);
        self
    }

    #[must_use]
    pub fn with_user_message(mut self, content: &str) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    #[must_use]
    pub fn with_assistant_message(mut self, content: &str) -> Self {
        self.messages.push(Message::assistant(content));
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    #[must_use]
    pub fn with_watermark(mut self, watermark: DateTime<Utc>) -> Self {
        self.watermark = Some(watermark);
        self
    }

    #[must_use]
    pub fn build(self) -> ConversationState {
        ConversationState {
            messages: MessagesChannel::new(self.messages, 1),
            errors: ErrorsChannel::default(),
            session: self.session,
            persona: self.persona,
            model: self.model,
            watermark: self.watermark,
        }
    }
}
