use super::Reducer;
use crate::{channels::Channel, node::NodePartial, state::ConversationState};

/// Appends partial error events to the errors channel.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct AddErrors;

impl Reducer for AddErrors {
    fn apply(&self, state: &mut ConversationState, update: &NodePartial) {
        if let Some(new_errors) = &update.errors
            && !new_errors.is_empty()
        {
            state.errors.get_mut().extend(new_errors.iter().cloned());
        }
    }
}
