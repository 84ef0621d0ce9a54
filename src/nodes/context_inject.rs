use async_trait::async_trait;

use crate::channels::ErrorEvent;
use crate::context::{ContextProvider, IncrementalContext};
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;

/// First node of every turn: decides between the full-history and
/// incremental context fetch and injects the result as a system-authored
/// context message.
///
/// The decision rule: exactly one message in state means no prior checkpoint
/// contributed history, so this is the thread's first turn and the whole
/// protocol transcript is fetched. Any other count means we are resuming,
/// and only messages past the stored watermark are pulled in.
pub struct ContextInjectNode {
    provider: ContextProvider,
}

impl ContextInjectNode {
    #[must_use]
    pub fn new(provider: ContextProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Node for ContextInjectNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let first_turn = snapshot.messages.len() == 1;

        if first_turn {
            ctx.emit("context", "first turn; fetching full protocol history");
            let block = self.provider.full_history(&snapshot.session).await;
            let mut partial =
                NodePartial::new().with_messages(vec![Message::system(&block.text)]);
            if let Some(newest) = block.newest {
                partial = partial.with_watermark(newest);
            }
            if block.failed {
                partial = partial.with_errors(vec![ErrorEvent::context(
                    "full_history",
                    block.text.clone(),
                )]);
            }
            return Ok(partial);
        }

        match self
            .provider
            .incremental(&snapshot.session, snapshot.watermark)
            .await
        {
            IncrementalContext::NothingNew => {
                ctx.emit("context", "no new client messages; injecting nothing");
                Ok(NodePartial::new())
            }
            IncrementalContext::Context(block) => {
                let mut partial =
                    NodePartial::new().with_messages(vec![Message::system(&block.text)]);
                if let Some(newest) = block.newest {
                    partial = partial.with_watermark(newest);
                }
                if block.failed {
                    partial = partial.with_errors(vec![ErrorEvent::context(
                        "incremental",
                        block.text.clone(),
                    )]);
                }
                Ok(partial)
            }
        }
    }
}
