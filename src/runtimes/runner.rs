//! The turn execution driver.
//!
//! [`TurnRunner`] owns the engine's collaborators (checkpoint store, session
//! directory, tool registry, model registry) and drives one invocation
//! through the fixed graph, writing a checkpoint after every node so a
//! crashed process resumes from the last durable snapshot instead of
//! replaying the whole turn.

use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::channels::Channel;
use crate::context::{ContextProvider, SessionDirectory};
use crate::control::route_after_think;
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::nodes::{AgentThinkNode, ContextInjectNode, ToolExecNode};
use crate::providers::{ModelParams, ModelRegistry};
use crate::reducers::ReducerRegistry;
use crate::runtimes::checkpointer::{
    Checkpoint, Checkpointer, CheckpointerError, restore_thread_state,
};
use crate::state::{ConversationState, PersonaConfig, SessionContext};
use crate::tools::ToolRegistry;
use crate::types::NodeKind;

/// One invocation: a new user utterance plus everything supplied fresh.
#[derive(Clone, Debug)]
pub struct TurnRequest {
    pub query: String,
    pub persona: PersonaConfig,
    pub session: SessionContext,
    pub model: ModelParams,
}

/// Result of a completed turn.
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    pub thread_id: String,
    pub turn_id: Uuid,
    /// The terminal assistant message's text.
    pub reply: String,
    /// Number of checkpoints this invocation wrote.
    pub checkpoints_written: u64,
    pub state: ConversationState,
}

/// Fatal turn failures (§7 classes c and d); everything recoverable is
/// folded into state instead of surfacing here.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("missing session identifier: {what}")]
    #[diagnostic(
        code(threadloom::runner::missing_identifier),
        help("protocol_number, attendance_id, contact_id, and base_url are all required.")
    )]
    MissingSessionField { what: &'static str },

    #[error("session identifier {field} does not match the thread's checkpointed value")]
    #[diagnostic(
        code(threadloom::runner::identifier_mismatch),
        help("protocol/attendance/contact identifiers are immutable for the life of a thread.")
    )]
    IdentifierMismatch { field: &'static str },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Node(#[from] NodeError),

    /// Checkpoint write failure. Fatal: silently losing a checkpoint would
    /// corrupt the next invocation's context-injection decision.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Checkpointer(#[from] CheckpointerError),

    #[error("turn exceeded {limit} think passes without terminating")]
    #[diagnostic(
        code(threadloom::runner::loop_limit),
        help("The model kept requesting tools; inspect the thread's checkpoint chain.")
    )]
    LoopLimitExceeded { limit: u32 },
}

/// Drives turns for any number of threads against shared collaborators.
///
/// The runner holds no per-thread mutable state; concurrent invocations for
/// different threads only share the checkpoint store. At most one in-flight
/// invocation per thread is assumed — serializing overlapping turns on one
/// thread is the caller's concern.
pub struct TurnRunner {
    checkpointer: Arc<dyn Checkpointer>,
    directory: Arc<dyn SessionDirectory>,
    tools: Arc<ToolRegistry>,
    models: Arc<ModelRegistry>,
    reducers: ReducerRegistry,
    max_think_passes: u32,
}

impl TurnRunner {
    /// Maximum think/act iterations per turn before the loop is declared
    /// runaway.
    pub const DEFAULT_MAX_THINK_PASSES: u32 = 25;

    #[must_use]
    pub fn new(
        checkpointer: Arc<dyn Checkpointer>,
        directory: Arc<dyn SessionDirectory>,
        tools: Arc<ToolRegistry>,
        models: Arc<ModelRegistry>,
    ) -> Self {
        Self {
            checkpointer,
            directory,
            tools,
            models,
            reducers: ReducerRegistry::default(),
            max_think_passes: Self::DEFAULT_MAX_THINK_PASSES,
        }
    }

    #[must_use]
    pub fn with_max_think_passes(mut self, limit: u32) -> Self {
        self.max_think_passes = limit;
        self
    }

    /// Invocation entrypoint for callers that want text either way: the
    /// terminal assistant message, or a textual error block on fatal
    /// failure.
    pub async fn handle_turn(&self, request: TurnRequest) -> String {
        match self.run_turn(request).await {
            Ok(outcome) => outcome.reply,
            Err(err) => {
                tracing::error!(error = %err, "turn failed");
                format!("The assistant could not complete this turn.\n\n{err}")
            }
        }
    }

    /// Run one full turn: resume or start the thread, merge the utterance,
    /// and drive the graph to `End`.
    #[instrument(skip(self, request), fields(attendance = %request.session.attendance_id), err)]
    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnOutcome, RunnerError> {
        validate_session(&request.session)?;
        let thread_id = request.session.attendance_id.clone();
        let turn_id = Uuid::new_v4();

        // A load failure is NOT fatal: missing history is recoverable via
        // incremental re-fetch, so degrade to fresh-thread behavior.
        let restored = match self.checkpointer.load_latest(&thread_id).await {
            Ok(checkpoint) => checkpoint,
            Err(err) => {
                tracing::warn!(
                    thread = %thread_id,
                    error = %err,
                    "checkpoint load failed; starting thread fresh"
                );
                None
            }
        };

        let (mut state, mut seq, mut parent) = match restored {
            Some(checkpoint) => {
                verify_identifiers(&checkpoint.state.session, &request.session)?;
                if checkpoint.state.persona.persona_id != request.persona.persona_id {
                    tracing::info!(
                        thread = %thread_id,
                        from = %checkpoint.state.persona.persona_id,
                        to = %request.persona.persona_id,
                        "persona switched between turns"
                    );
                }
                let state =
                    restore_thread_state(&checkpoint, request.persona.clone(), request.model.clone());
                (state, checkpoint.checkpoint_id, Some(checkpoint.checkpoint_id))
            }
            None => (
                ConversationState::new(
                    request.session.clone(),
                    request.persona.clone(),
                    request.model.clone(),
                ),
                0,
                None,
            ),
        };

        // Merge the new utterance through the same reducer path nodes use.
        self.apply(&mut state, &NodePartial::new().with_messages(vec![Message::user(
            &request.query,
        )]));

        let context_node = ContextInjectNode::new(ContextProvider::new(self.directory.clone()));
        let think_node = AgentThinkNode::new(self.models.clone(), self.tools.clone());
        let exec_node = ToolExecNode::new(self.tools.clone());

        let mut kind = NodeKind::ContextInject;
        let mut think_passes = 0u32;
        let mut written = 0u64;

        loop {
            if kind == NodeKind::AgentThink {
                think_passes += 1;
                if think_passes > self.max_think_passes {
                    return Err(RunnerError::LoopLimitExceeded {
                        limit: self.max_think_passes,
                    });
                }
            }

            let ctx = NodeContext {
                node: kind,
                checkpoint_seq: seq + 1,
                thread_id: thread_id.clone(),
                turn_id,
            };
            let partial = match kind {
                NodeKind::ContextInject => context_node.run(state.snapshot(), ctx).await?,
                NodeKind::AgentThink => think_node.run(state.snapshot(), ctx).await?,
                NodeKind::ToolExec => exec_node.run(state.snapshot(), ctx).await?,
                NodeKind::End => break,
            };

            self.apply(&mut state, &partial);

            // One checkpoint per completed node; a write failure is fatal.
            seq += 1;
            self.checkpointer
                .save(Checkpoint::next(
                    &thread_id,
                    seq,
                    parent,
                    kind,
                    turn_id,
                    &state,
                ))
                .await?;
            parent = Some(seq);
            written += 1;

            kind = match kind {
                NodeKind::ContextInject => NodeKind::AgentThink,
                NodeKind::AgentThink => route_after_think(state.messages.last()),
                NodeKind::ToolExec => NodeKind::AgentThink,
                NodeKind::End => NodeKind::End,
            };
        }

        let reply = final_reply(&state);
        tracing::info!(
            thread = %thread_id,
            turn = %turn_id,
            checkpoints = written,
            think_passes,
            "turn completed"
        );
        Ok(TurnOutcome {
            thread_id,
            turn_id,
            reply,
            checkpoints_written: written,
            state,
        })
    }

    fn apply(&self, state: &mut ConversationState, partial: &NodePartial) {
        match self.reducers.apply_all(state, partial) {
            Ok(updated) if !updated.is_empty() => {
                tracing::debug!(channels = ?updated, "state updated");
            }
            Ok(_) => {}
            // Unknown-channel means a reducer registry misconfiguration;
            // with the default registry this is unreachable.
            Err(err) => {
                tracing::error!(error = %err, "reducer application failed");
            }
        }
    }
}

fn validate_session(session: &SessionContext) -> Result<(), RunnerError> {
    if session.protocol_number.is_empty() {
        return Err(RunnerError::MissingSessionField {
            what: "protocol_number",
        });
    }
    if session.attendance_id.is_empty() {
        return Err(RunnerError::MissingSessionField {
            what: "attendance_id",
        });
    }
    if session.contact_id.is_empty() {
        return Err(RunnerError::MissingSessionField {
            what: "contact_id",
        });
    }
    if session.base_url.is_empty() {
        return Err(RunnerError::MissingSessionField { what: "base_url" });
    }
    Ok(())
}

fn verify_identifiers(
    stored: &SessionContext,
    incoming: &SessionContext,
) -> Result<(), RunnerError> {
    if stored.protocol_number != incoming.protocol_number {
        return Err(RunnerError::IdentifierMismatch {
            field: "protocol_number",
        });
    }
    if stored.attendance_id != incoming.attendance_id {
        return Err(RunnerError::IdentifierMismatch {
            field: "attendance_id",
        });
    }
    if stored.contact_id != incoming.contact_id {
        return Err(RunnerError::IdentifierMismatch {
            field: "contact_id",
        });
    }
    Ok(())
}

fn final_reply(state: &ConversationState) -> String {
    state
        .messages
        .snapshot()
        .iter()
        .rev()
        .find(|m| m.has_role(Message::ASSISTANT))
        .map(|m| m.content.clone())
        .unwrap_or_default()
}
