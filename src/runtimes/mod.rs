//! Turn runtime: checkpoint persistence and the execution driver.
//!
//! The runtime layer is built around a few abstractions:
//!
//! - **[`TurnRunner`]** — drives one invocation from `ContextInject` to the
//!   terminal reply, checkpointing after every node.
//! - **[`Checkpointer`]** — trait for pluggable durable persistence.
//! - **Persistence models** — serde-friendly shapes decoupled from the
//!   in-memory state.
//!
//! # Persistence Backends
//!
//! - **[`InMemoryCheckpointer`]** — volatile storage for tests and development
//! - **[`SqliteCheckpointer`]** — durable SQLite-backed persistence

pub mod checkpointer;
#[cfg(feature = "sqlite")]
pub mod checkpointer_sqlite;
pub mod persistence;
pub mod runner;

pub use checkpointer::{
    Checkpoint, CheckpointQuery, Checkpointer, CheckpointerError, InMemoryCheckpointer,
    restore_thread_state,
};
#[cfg(feature = "sqlite")]
pub use checkpointer_sqlite::SqliteCheckpointer;
pub use persistence::{PersistedCheckpoint, PersistedState, PersistenceError};
pub use runner::{RunnerError, TurnOutcome, TurnRequest, TurnRunner};
