/*!
Persistence primitives for serializing/deserializing checkpoints (used by
the SQLite checkpointer and any future persistent backends).

Design Goals:
- Provide explicit serde-friendly structs decoupled from internal
  in-memory representations.
- Keep conversion logic localized (From / TryFrom impls) so the
  checkpointer code is lean and declarative.
- Carry only what a checkpoint's business meaning needs: the persona
  prompt, tool list, and model parameters are per-invocation input and are
  deliberately absent from the persisted shape.

This module intentionally does NOT perform I/O. It is pure data
transformation and (de)serialization glue.
*/

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    channels::{Channel, ErrorEvent, ErrorsChannel, MessagesChannel},
    message::Message,
    runtimes::checkpointer::Checkpoint,
    state::{ConversationState, PersonaConfig, SessionContext},
    types::NodeKind,
    utils::json_ext::JsonSerializable,
};

/// Blanket implementation of JsonSerializable for all suitable types using
/// PersistenceError.
impl<T> JsonSerializable<PersistenceError> for T
where
    T: serde::Serialize + for<'de> serde::de::DeserializeOwned,
{
    fn to_json_string(&self) -> std::result::Result<String, PersistenceError> {
        serde_json::to_string(self).map_err(|e| PersistenceError::Serde { source: e })
    }

    fn from_json_str(s: &str) -> std::result::Result<Self, PersistenceError> {
        serde_json::from_str(s).map_err(|e| PersistenceError::Serde { source: e })
    }
}

/// Channel that stores a vector collection with version metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedVecChannel<T> {
    pub version: u32,
    #[serde(default)]
    pub items: Vec<T>,
}

impl<T> Default for PersistedVecChannel<T> {
    fn default() -> Self {
        Self {
            version: 1,
            items: Vec::new(),
        }
    }
}

/// Complete persisted shape of the in-memory ConversationState.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedState {
    pub messages: PersistedVecChannel<Message>,
    #[serde(default)]
    pub errors: PersistedVecChannel<ErrorEvent>,
    pub session: SessionContext,
    pub persona_id: String,
    /// RFC3339 string form (keeps chrono::DateTime out of the serialized shape).
    #[serde(default)]
    pub watermark: Option<String>,
}

/// Full persisted checkpoint representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedCheckpoint {
    pub thread_id: String,
    pub checkpoint_id: u64,
    #[serde(default)]
    pub parent_id: Option<u64>,
    /// Node encoded via NodeKind::encode().
    pub node: String,
    pub turn_id: String,
    pub state: PersistedState,
    /// RFC3339 string form of creation time.
    pub created_at: String,
}

/// Bidirectional conversion and serialization errors for persistence models.
#[derive(Debug, Error, Diagnostic)]
pub enum PersistenceError {
    #[error("missing field: {0}")]
    #[diagnostic(
        code(threadloom::persistence::missing_field),
        help("Populate the field in the persisted JSON before conversion.")
    )]
    MissingField(&'static str),

    #[error("JSON serialization/deserialization failed: {source}")]
    #[diagnostic(
        code(threadloom::persistence::serde),
        help("Ensure the JSON structure matches the Persisted* types.")
    )]
    Serde {
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown node encoding: {0}")]
    #[diagnostic(
        code(threadloom::persistence::node_kind),
        help("The checkpoint was written by an incompatible schema version.")
    )]
    UnknownNodeKind(String),

    #[error("persistence error: {0}")]
    #[diagnostic(code(threadloom::persistence::other))]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

/* ---------- ConversationState <-> PersistedState Conversions ---------- */

impl From<&ConversationState> for PersistedState {
    fn from(s: &ConversationState) -> Self {
        PersistedState {
            messages: PersistedVecChannel {
                version: s.messages.version(),
                items: s.messages.snapshot(),
            },
            errors: PersistedVecChannel {
                version: s.errors.version(),
                items: s.errors.snapshot(),
            },
            session: s.session.clone(),
            persona_id: s.persona.persona_id.clone(),
            watermark: s.watermark.map(|w| w.to_rfc3339()),
        }
    }
}

impl TryFrom<PersistedState> for ConversationState {
    type Error = PersistenceError;

    fn try_from(p: PersistedState) -> Result<Self> {
        let watermark = match p.watermark {
            Some(raw) => Some(parse_rfc3339(&raw, "watermark")?),
            None => None,
        };
        Ok(ConversationState {
            messages: MessagesChannel::new(p.messages.items, p.messages.version),
            errors: ErrorsChannel::new(p.errors.items, p.errors.version),
            session: p.session,
            // Only the id survives persistence; the runner hydrates the rest.
            persona: PersonaConfig {
                persona_id: p.persona_id,
                ..PersonaConfig::default()
            },
            model: None,
            watermark,
        })
    }
}

/* ---------- Checkpoint <-> PersistedCheckpoint Conversions ---------- */

impl From<&Checkpoint> for PersistedCheckpoint {
    fn from(cp: &Checkpoint) -> Self {
        PersistedCheckpoint {
            thread_id: cp.thread_id.clone(),
            checkpoint_id: cp.checkpoint_id,
            parent_id: cp.parent_id,
            node: cp.node.encode().to_string(),
            turn_id: cp.turn_id.to_string(),
            state: PersistedState::from(&cp.state),
            created_at: cp.created_at.to_rfc3339(),
        }
    }
}

impl TryFrom<PersistedCheckpoint> for Checkpoint {
    type Error = PersistenceError;

    fn try_from(p: PersistedCheckpoint) -> Result<Self> {
        let state = ConversationState::try_from(p.state)?;
        let node = NodeKind::decode(&p.node)
            .ok_or_else(|| PersistenceError::UnknownNodeKind(p.node.clone()))?;
        let turn_id = Uuid::parse_str(&p.turn_id)
            .map_err(|e| PersistenceError::Other(format!("turn_id parse: {e}")))?;
        let created_at = DateTime::parse_from_rfc3339(&p.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Ok(Checkpoint {
            thread_id: p.thread_id,
            checkpoint_id: p.checkpoint_id,
            parent_id: p.parent_id,
            node,
            turn_id,
            state,
            created_at,
        })
    }
}

fn parse_rfc3339(raw: &str, what: &'static str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PersistenceError::Other(format!("{what} parse: {e}")))
}
