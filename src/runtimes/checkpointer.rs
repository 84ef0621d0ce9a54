//! Checkpoint model and the pluggable store trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::providers::ModelParams;
use crate::state::{ConversationState, PersonaConfig};
use crate::types::NodeKind;

/// A durable snapshot of conversation state at one node boundary.
///
/// Checkpoints form a singly linked parent chain per thread: each one
/// (except a fresh thread's first) references the immediately preceding
/// checkpoint. Identifiers are a per-thread monotonic sequence, continued
/// from the restored checkpoint when a turn resumes, so "latest" is a plain
/// integer ordering.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub thread_id: String,
    pub checkpoint_id: u64,
    pub parent_id: Option<u64>,
    /// The node whose completion produced this snapshot.
    pub node: NodeKind,
    /// Correlates every checkpoint written by one invocation.
    pub turn_id: Uuid,
    pub state: ConversationState,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Snapshot the given state as the next link of a thread's chain.
    #[must_use]
    pub fn next(
        thread_id: &str,
        checkpoint_id: u64,
        parent_id: Option<u64>,
        node: NodeKind,
        turn_id: Uuid,
        state: &ConversationState,
    ) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            checkpoint_id,
            parent_id,
            node,
            turn_id,
            state: state.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Pagination cursor for audit traversal of a thread's chain.
///
/// `list` is restartable per call: pass the last seen checkpoint id as
/// `before` to continue where the previous page stopped. `limit: None`
/// returns the whole remainder — the contract is open-ended iteration.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckpointQuery {
    pub limit: Option<u32>,
    /// Only checkpoints with ids strictly below this one.
    pub before: Option<u64>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointerError {
    #[error("checkpoint backend error: {message}")]
    #[diagnostic(
        code(threadloom::checkpointer::backend),
        help("Verify the store is reachable and the schema is migrated.")
    )]
    Backend { message: String },

    #[error("checkpoint serialization error: {message}")]
    #[diagnostic(code(threadloom::checkpointer::serde))]
    Serialization { message: String },

    #[error("checkpoint error: {message}")]
    #[diagnostic(code(threadloom::checkpointer::other))]
    Other { message: String },
}

pub type Result<T> = std::result::Result<T, CheckpointerError>;

/// Durable, ordered persistence for a thread's checkpoint chain.
///
/// `save` must be atomic per `(thread_id, checkpoint_id)` key: a concurrent
/// reader never observes a partially written checkpoint. Re-saving an
/// existing key replaces it (idempotent writes for crash-retry).
#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn save(&self, checkpoint: Checkpoint) -> Result<()>;

    /// The checkpoint with no newer sibling, or `None` for a fresh thread.
    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// One specific checkpoint.
    async fn load(&self, thread_id: &str, checkpoint_id: u64) -> Result<Option<Checkpoint>>;

    /// Newest-first page of the thread's chain.
    async fn list(&self, thread_id: &str, query: CheckpointQuery) -> Result<Vec<Checkpoint>>;
}

/// Rebuild in-memory state from a restored checkpoint, hydrating the
/// per-invocation fields the durable form deliberately does not carry.
///
/// The restored persona keeps only its id; prompt, tool list, and model
/// parameters come from the current request because personas and back-ends
/// may change between turns.
#[must_use]
pub fn restore_thread_state(
    checkpoint: &Checkpoint,
    persona: PersonaConfig,
    model: ModelParams,
) -> ConversationState {
    let mut state = checkpoint.state.clone();
    state.persona = persona;
    state.model = Some(model);
    state
}

/// Volatile checkpointer for tests and development.
///
/// Chains are kept ordered by checkpoint id; writes to an existing id
/// replace in place, mirroring the SQLite backend's upsert.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointer {
    threads: RwLock<FxHashMap<String, Vec<Checkpoint>>>,
}

impl InMemoryCheckpointer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of all threads with at least one checkpoint.
    pub async fn thread_ids(&self) -> Vec<String> {
        self.threads.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, checkpoint: Checkpoint) -> Result<()> {
        let mut threads = self.threads.write().await;
        let chain = threads.entry(checkpoint.thread_id.clone()).or_default();
        match chain.binary_search_by_key(&checkpoint.checkpoint_id, |c| c.checkpoint_id) {
            Ok(existing) => chain[existing] = checkpoint,
            Err(position) => chain.insert(position, checkpoint),
        }
        Ok(())
    }

    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(thread_id)
            .and_then(|chain| chain.last().cloned()))
    }

    async fn load(&self, thread_id: &str, checkpoint_id: u64) -> Result<Option<Checkpoint>> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).and_then(|chain| {
            chain
                .binary_search_by_key(&checkpoint_id, |c| c.checkpoint_id)
                .ok()
                .map(|index| chain[index].clone())
        }))
    }

    async fn list(&self, thread_id: &str, query: CheckpointQuery) -> Result<Vec<Checkpoint>> {
        let threads = self.threads.read().await;
        let Some(chain) = threads.get(thread_id) else {
            return Ok(Vec::new());
        };
        let page: Vec<Checkpoint> = chain
            .iter()
            .rev()
            .filter(|c| query.before.is_none_or(|cursor| c.checkpoint_id < cursor))
            .take(query.limit.map(|l| l as usize).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(page)
    }
}
