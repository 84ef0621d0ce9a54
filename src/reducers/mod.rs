//! State merge strategies.
//!
//! Every reducer folds a [`NodePartial`] into [`ConversationState`] for one
//! channel. Merges are append-only for messages and errors (concatenation in
//! insertion order, no deduplication — resubmitting a message is the
//! caller's bug, not the merge's to fix) and monotonic for the watermark.

mod add_errors;
mod add_messages;
mod advance_watermark;
mod reducer_registry;

pub use add_errors::AddErrors;
pub use add_messages::AddMessages;
pub use advance_watermark::AdvanceWatermark;
pub use reducer_registry::ReducerRegistry;

use std::fmt;

use crate::node::NodePartial;
use crate::state::ConversationState;
use crate::types::ChannelType;

/// Unified reducer trait: every reducer mutates ConversationState using a
/// NodePartial delta.
pub trait Reducer: Send + Sync {
    fn apply(&self, state: &mut ConversationState, update: &NodePartial);
}

#[derive(Debug)]
pub enum ReducerError {
    UnknownChannel(ChannelType),
}

impl fmt::Display for ReducerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReducerError::UnknownChannel(channel) => {
                write!(f, "no reducers registered for channel: {channel:?}")
            }
        }
    }
}

impl std::error::Error for ReducerError {}
