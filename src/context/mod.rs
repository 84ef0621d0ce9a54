//! Context providers: external-data-to-text adapters.
//!
//! Two read-only operations turn raw host-platform records into normalized,
//! chronologically ordered transcript text for the orchestrator's first
//! node: a full-history fetch across every prior session of the protocol,
//! and an incremental fetch of the active session filtered by the thread's
//! watermark.
//!
//! Both operations are deliberately infallible at their boundary: transport
//! failures become human-readable error text injected into the model's
//! context, because a transient fetch failure should not block the
//! assistant from at least acknowledging the user.

pub mod directory;
pub mod transcript;

pub use directory::{
    DirectoryError, HttpSessionDirectory, RawMessage, RawSession, SessionDirectory,
};
pub use transcript::{
    ContextProvider, HistoryBlock, IncrementalContext, NO_HISTORY, render_transcript,
    sort_chronological,
};
