//! Routing decisions for the turn loop.
//!
//! Loop termination is a control-flow concern, not a state mutation: the
//! model signals "I am done" by requesting a conventionally named finish
//! tool, and the router intercepts that request before dispatch. The
//! classification is an explicit sum type so the completion check cannot
//! drift from the dispatch path.

use crate::message::{Message, ToolCall};
use crate::types::NodeKind;

/// Reserved tool name that ends the think/act loop without being dispatched.
///
/// Back-ends are told about this tool when binding; the registry refuses to
/// accept a real handler under the name.
pub const COMPLETION_TOOL: &str = "finish_turn";

/// What the router should do with one requested tool call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolDirective {
    /// The reserved completion sentinel: stop the loop, execute nothing.
    Complete,
    /// An ordinary call to dispatch through the tool registry.
    Invoke(String),
}

impl ToolDirective {
    #[must_use]
    pub fn classify(call: &ToolCall) -> Self {
        if call.name == COMPLETION_TOOL {
            ToolDirective::Complete
        } else {
            ToolDirective::Invoke(call.name.clone())
        }
    }
}

/// Routing rule applied after every `AgentThink` pass.
///
/// - no tool calls → the reply is final, go to `End`;
/// - any completion sentinel → `End`, without executing that call;
/// - otherwise → `ToolExec`.
#[must_use]
pub fn route_after_think(latest: Option<&Message>) -> NodeKind {
    let Some(message) = latest else {
        return NodeKind::End;
    };
    if !message.requests_tools() {
        return NodeKind::End;
    }
    let wants_completion = message
        .tool_calls
        .iter()
        .any(|call| ToolDirective::classify(call) == ToolDirective::Complete);
    if wants_completion {
        NodeKind::End
    } else {
        NodeKind::ToolExec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_reply_terminates() {
        let reply = Message::assistant("done");
        assert_eq!(route_after_think(Some(&reply)), NodeKind::End);
    }

    #[test]
    fn completion_sentinel_terminates_without_dispatch() {
        let reply = Message::assistant_with_calls(
            "",
            vec![ToolCall::new("c1", COMPLETION_TOOL, json!({}))],
        );
        assert_eq!(route_after_think(Some(&reply)), NodeKind::End);
    }

    #[test]
    fn ordinary_calls_route_to_tool_exec() {
        let reply = Message::assistant_with_calls(
            "checking",
            vec![ToolCall::new("c1", "lookup_order", json!({"order": 1}))],
        );
        assert_eq!(route_after_think(Some(&reply)), NodeKind::ToolExec);
    }

    #[test]
    fn mixed_batch_with_sentinel_still_terminates() {
        let reply = Message::assistant_with_calls(
            "",
            vec![
                ToolCall::new("c1", "lookup_order", json!({})),
                ToolCall::new("c2", COMPLETION_TOOL, json!({})),
            ],
        );
        assert_eq!(route_after_think(Some(&reply)), NodeKind::End);
    }
}
