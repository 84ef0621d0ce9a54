//! Node execution framework for the turn graph.
//!
//! Nodes receive an immutable [`StateSnapshot`] plus a [`NodeContext`],
//! do their work, and return a [`NodePartial`] describing the state delta.
//! The runner merges partials through the reducer registry and checkpoints
//! after every node.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use thiserror::Error;
use uuid::Uuid;

use crate::channels::ErrorEvent;
use crate::message::Message;
use crate::providers::ModelError;
use crate::state::StateSnapshot;
use crate::types::NodeKind;

/// Core trait defining an executable node of the turn graph.
///
/// # Error Handling
///
/// Nodes distinguish two failure classes:
/// 1. **Fatal** (`Err(NodeError)`): configuration and model-invocation
///    failures that abort the turn.
/// 2. **Recoverable**: folded into the returned partial as messages and
///    [`ErrorEvent`]s so the model can see and react to them.
#[async_trait]
pub trait Node: Send + Sync {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError>;
}

/// Execution context passed to nodes.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Which node this is.
    pub node: NodeKind,
    /// Sequence number of the checkpoint this node's completion will write.
    pub checkpoint_seq: u64,
    /// The thread being processed.
    pub thread_id: String,
    /// Correlates all checkpoints written by one invocation.
    pub turn_id: Uuid,
}

impl NodeContext {
    /// Emit a node-scoped diagnostic through the tracing pipeline.
    pub fn emit(&self, scope: &str, message: impl AsRef<str>) {
        tracing::debug!(
            node = %self.node,
            checkpoint = self.checkpoint_seq,
            thread = %self.thread_id,
            turn = %self.turn_id,
            scope,
            "{}",
            message.as_ref()
        );
    }
}

/// Partial state update returned by node execution.
///
/// All fields optional; the reducer registry merges what is present.
#[derive(Clone, Debug, Default)]
pub struct NodePartial {
    /// Messages to append to the history.
    pub messages: Option<Vec<Message>>,
    /// Recoverable error events to record.
    pub errors: Option<Vec<ErrorEvent>>,
    /// New low-water mark for externally sourced messages.
    pub watermark: Option<DateTime<Utc>>,
}

impl NodePartial {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }

    #[must_use]
    pub fn with_errors(mut self, errors: Vec<ErrorEvent>) -> Self {
        self.errors = Some(errors);
        self
    }

    #[must_use]
    pub fn with_watermark(mut self, watermark: DateTime<Utc>) -> Self {
        self.watermark = Some(watermark);
        self
    }
}

/// Fatal errors that halt the turn.
///
/// Everything recoverable travels inside `NodePartial` instead.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Expected input data is missing from the state snapshot.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(threadloom::node::missing_input),
        help("Check that the previous node produced the required data.")
    )]
    MissingInput { what: &'static str },

    /// Model selection or invocation failure; not retried.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(threadloom::node::serde_json))]
    Serde(#[from] serde_json::Error),
}
