use rustc_hash::FxHashMap;
use std::sync::Arc;

use tracing::instrument;

use crate::{
    channels::Channel,
    node::NodePartial,
    reducers::{AddErrors, AddMessages, AdvanceWatermark, Reducer, ReducerError},
    state::ConversationState,
    types::ChannelType,
};

/// Registry applying the channel reducers that make up a barrier merge.
///
/// Versions are bumped here — once per channel that actually received data —
/// so nodes and direct mutation never have to think about version counters.
#[derive(Clone)]
pub struct ReducerRegistry {
    reducer_map: FxHashMap<ChannelType, Vec<Arc<dyn Reducer>>>,
}

/// Checks whether a NodePartial actually has meaningful data for the
/// specified channel, so the registry can skip reducers with nothing to do.
fn channel_guard(channel: &ChannelType, partial: &NodePartial) -> bool {
    match channel {
        ChannelType::Message => partial
            .messages
            .as_ref()
            .map(|v| !v.is_empty())
            .unwrap_or(false),
        ChannelType::Error => partial
            .errors
            .as_ref()
            .map(|v| !v.is_empty())
            .unwrap_or(false),
        ChannelType::Watermark => partial.watermark.is_some(),
    }
}

impl Default for ReducerRegistry {
    fn default() -> Self {
        Self::new()
            .with_reducer(ChannelType::Message, Arc::new(AddMessages))
            .with_reducer(ChannelType::Error, Arc::new(AddErrors))
            .with_reducer(ChannelType::Watermark, Arc::new(AdvanceWatermark))
    }
}

impl ReducerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            reducer_map: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn with_reducer(mut self, channel: ChannelType, reducer: Arc<dyn Reducer>) -> Self {
        self.reducer_map.entry(channel).or_default().push(reducer);
        self
    }

    #[instrument(skip(self, state, to_update), err)]
    pub fn try_update(
        &self,
        channel_type: ChannelType,
        state: &mut ConversationState,
        to_update: &NodePartial,
    ) -> Result<bool, ReducerError> {
        if !channel_guard(&channel_type, to_update) {
            return Ok(false);
        }

        let Some(reducers) = self.reducer_map.get(&channel_type) else {
            return Err(ReducerError::UnknownChannel(channel_type));
        };
        for reducer in reducers {
            reducer.apply(state, to_update);
        }
        match channel_type {
            ChannelType::Message => state.messages.bump(),
            ChannelType::Error => state.errors.bump(),
            // The watermark is a scalar, not a versioned channel.
            ChannelType::Watermark => {}
        }
        Ok(true)
    }

    /// Apply all registered channels and return the ones that changed.
    #[instrument(skip(self, state, merged_update), err)]
    pub fn apply_all(
        &self,
        state: &mut ConversationState,
        merged_update: &NodePartial,
    ) -> Result<Vec<ChannelType>, ReducerError> {
        let mut updated = Vec::new();
        for channel in self.reducer_map.keys() {
            if self.try_update(channel.clone(), state, merged_update)? {
                updated.push(channel.clone());
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::state::{ConversationState, SessionContext};
    use chrono::{TimeZone, Utc};

    fn state() -> ConversationState {
        ConversationState::builder(SessionContext {
            protocol_number: "P1".into(),
            attendance_id: "A1".into(),
            contact_id: "C1".into(),
            base_url: "https://console.example".into(),
        })
        .with_user_message("hi")
        .build()
    }

    #[test]
    fn messages_concatenate_in_order_and_bump_version() {
        let registry = ReducerRegistry::default();
        let mut state = state();
        let partial = NodePartial::new()
            .with_messages(vec![Message::assistant("a"), Message::assistant("b")]);
        let updated = registry.apply_all(&mut state, &partial).unwrap();
        assert_eq!(updated, vec![ChannelType::Message]);
        let messages = state.messages.snapshot();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content, "a");
        assert_eq!(messages[2].content, "b");
        assert_eq!(state.messages.version(), 2);
    }

    #[test]
    fn watermark_never_rewinds() {
        let registry = ReducerRegistry::default();
        let mut state = state();
        let newer = Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();

        registry
            .apply_all(&mut state, &NodePartial::new().with_watermark(newer))
            .unwrap();
        registry
            .apply_all(&mut state, &NodePartial::new().with_watermark(older))
            .unwrap();
        assert_eq!(state.watermark, Some(newer));
    }

    #[test]
    fn empty_partial_touches_nothing() {
        let registry = ReducerRegistry::default();
        let mut state = state();
        let updated = registry.apply_all(&mut state, &NodePartial::new()).unwrap();
        assert!(updated.is_empty());
        assert_eq!(state.messages.version(), 1);
    }
}
