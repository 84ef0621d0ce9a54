use super::Reducer;
use crate::{channels::Channel, node::NodePartial, state::ConversationState};

/// Appends partial messages to the history, preserving insertion order.
///
/// Duplicate-id messages are kept as-is; the merge never truncates,
/// reorders, or de-duplicates.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct AddMessages;

impl Reducer for AddMessages {
    fn apply(&self, state: &mut ConversationState, update: &NodePartial) {
        if let Some(new_messages) = &update.messages
            && !new_messages.is_empty()
        {
            state.messages.get_mut().extend(new_messages.iter().cloned());
        }
    }
}
