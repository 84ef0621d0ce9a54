use super::Reducer;
use crate::{node::NodePartial, state::ConversationState};

/// Advances the thread's watermark, never rewinding it.
///
/// A partial carrying an older timestamp than the current watermark leaves
/// state untouched; the watermark is the low-water mark for "new" incoming
/// messages and must be monotonic across turns.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct AdvanceWatermark;

impl Reducer for AdvanceWatermark {
    fn apply(&self, state: &mut ConversationState, update: &NodePartial) {
        if let Some(candidate) = update.watermark {
            state.watermark = Some(match state.watermark {
                Some(current) => current.max(candidate),
                None => candidate,
            });
        }
    }
}
