use std::sync::Arc;

use async_trait::async_trait;

use crate::channels::ErrorEvent;
use crate::control::ToolDirective;
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;
use crate::tools::ToolRegistry;

/// Dispatches every tool call of the latest assistant message, appending
/// exactly one result message per call.
///
/// Handler failures never abort the turn: they are folded into result text
/// so the model can react (apologize, retry with different arguments) on
/// its next pass.
pub struct ToolExecNode {
    tools: Arc<ToolRegistry>,
}

impl ToolExecNode {
    #[must_use]
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Node for ToolExecNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let latest = snapshot.latest_message().ok_or(NodeError::MissingInput {
            what: "assistant message with tool calls",
        })?;

        let mut results = Vec::with_capacity(latest.tool_calls.len());
        let mut errors = Vec::new();

        for call in &latest.tool_calls {
            match ToolDirective::classify(call) {
                // The router terminates on the sentinel before reaching this
                // node; a mixed batch that slipped through is not executed.
                ToolDirective::Complete => {
                    ctx.emit("tools", "skipping completion sentinel in call batch");
                    continue;
                }
                ToolDirective::Invoke(name) => {
                    ctx.emit("tools", format!("dispatching {name}"));
                    let text = match self.tools.execute(call).await {
                        Ok(text) => text,
                        Err(err) => {
                            errors.push(ErrorEvent::tool(name.clone(), err.to_string()));
                            format!("[tool error] {err}")
                        }
                    };
                    results.push(Message::tool_result(&call.id, &text));
                }
            }
        }

        let mut partial = NodePartial::new().with_messages(results);
        if !errors.is_empty() {
            partial = partial.with_errors(errors);
        }
        Ok(partial)
    }
}
