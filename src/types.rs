//! Core types for the threadloom engine.
//!
//! This module defines the engine's node identifiers and state channels.
//! The turn graph is fixed, so [`NodeKind`] is a closed sum type rather
//! than an open registry: routing bugs become compile errors, not
//! "handler not found" at runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one node of the fixed turn graph.
///
/// A turn always runs `ContextInject → AgentThink`, then loops
/// `ToolExec → AgentThink` while the model keeps requesting tools, and
/// finishes at `End`. `End` is virtual: it is routed to, never executed.
///
/// # Persistence
///
/// `NodeKind` is stored in every checkpoint via [`encode`](Self::encode) /
/// [`decode`](Self::decode) so audit queries can tell which node produced
/// a snapshot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Injects transcript context (full history or incremental) before the
    /// model ever sees the turn.
    ContextInject,
    /// One model invocation over the full history plus the system directive.
    AgentThink,
    /// Dispatches every tool call of the latest assistant message.
    ToolExec,
    /// Terminal marker; the turn's final state is returned when routing
    /// reaches it.
    End,
}

impl NodeKind {
    /// Encode a NodeKind into its persisted string form.
    #[must_use]
    pub fn encode(&self) -> &'static str {
        match self {
            NodeKind::ContextInject => "ContextInject",
            NodeKind::AgentThink => "AgentThink",
            NodeKind::ToolExec => "ToolExec",
            NodeKind::End => "End",
        }
    }

    /// Decode a persisted string form back into a NodeKind.
    ///
    /// Returns `None` for unrecognized encodings; persisted checkpoints
    /// from a different schema version surface as a conversion error
    /// rather than silently routing somewhere wrong.
    #[must_use]
    pub fn decode(s: &str) -> Option<Self> {
        match s {
            "ContextInject" => Some(NodeKind::ContextInject),
            "AgentThink" => Some(NodeKind::AgentThink),
            "ToolExec" => Some(NodeKind::ToolExec),
            "End" => Some(NodeKind::End),
            _ => None,
        }
    }

    /// Returns `true` if this is the virtual [`End`](Self::End) node.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encode())
    }
}

/// Identifies the type of data channel used for state management.
///
/// Each channel type has its own reducer and update semantics: messages
/// append, errors append, the watermark advances monotonically.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    /// Conversation messages (user, assistant, system context, tool results).
    Message,
    /// Recoverable error events recorded for diagnostics.
    Error,
    /// The last-processed-client-message timestamp.
    Watermark,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => write!(f, "message"),
            Self::Error => write!(f, "error"),
            Self::Watermark => write!(f, "watermark"),
        }
    }
}
