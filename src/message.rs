use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A structured action request carried by an assistant message.
///
/// The model emits zero or more of these per reply; each names a registered
/// tool and carries its arguments as a JSON object. The `id` ties the request
/// to the tool-result message produced for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id assigned by the model back-end.
    pub id: String,
    /// Name of the requested tool.
    pub name: String,
    /// Arguments as a JSON value matching the tool's declared schema.
    pub arguments: Value,
}

impl ToolCall {
    #[must_use]
    pub fn new(id: &str, name: &str, arguments: Value) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }
    }
}

/// A message in a conversation: a role, text content, and (for assistant
/// turns) any structured tool-call requests.
///
/// Messages are the unit the whole engine moves around: the user's utterance,
/// injected context blocks, model replies, and tool results are all
/// `Message` values appended to the thread's history.
///
/// # Serialization
///
/// Messages round-trip through serde without loss of role, content, or
/// tool-call fields; empty tool metadata is omitted from the serialized form.
///
/// ```
/// use threadloom::message::Message;
///
/// let msg = Message::user("test");
/// let json = serde_json::to_string(&msg).unwrap();
/// let parsed: Message = serde_json::from_str(&json).unwrap();
/// assert_eq!(msg, parsed);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender (e.g., "user", "assistant", "system").
    ///
    /// Use the constants on [`Message`] for standardized values.
    pub role: String,
    /// The text content of the message.
    pub content: String,
    /// Tool-call requests attached to an assistant reply.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool-result messages, the id of the call this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// AI assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System prompt, directive, or injected-context message role.
    pub const SYSTEM: &'static str = "system";
    /// Tool execution result message role.
    pub const TOOL: &'static str = "tool";

    /// Creates a new message with the specified role and content.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Creates a user message with the specified content.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant message with the specified content.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates an assistant message carrying tool-call requests.
    #[must_use]
    pub fn assistant_with_calls(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Self::ASSISTANT.to_string(),
            content: content.to_string(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Creates a system message with the specified content.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Creates a tool-result message answering the call with `call_id`.
    #[must_use]
    pub fn tool_result(call_id: &str, content: &str) -> Self {
        Self {
            role: Self::TOOL.to_string(),
            content: content.to_string(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.to_string()),
        }
    }

    /// Returns true if this message has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }

    /// Returns true if this message carries at least one tool-call request.
    #[must_use]
    pub fn requests_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_convenience_constructors() {
        let user_msg = Message::user("Hello");
        assert_eq!(user_msg.role, Message::USER);
        assert_eq!(user_msg.content, "Hello");
        assert!(!user_msg.requests_tools());

        let assistant_msg = Message::assistant("Hi there!");
        assert_eq!(assistant_msg.role, Message::ASSISTANT);

        let system_msg = Message::system("You are helpful");
        assert_eq!(system_msg.role, Message::SYSTEM);

        let result_msg = Message::tool_result("call_1", "42");
        assert_eq!(result_msg.role, Message::TOOL);
        assert_eq!(result_msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_role_checking() {
        let user_msg = Message::user("Hello");
        assert!(user_msg.has_role(Message::USER));
        assert!(!user_msg.has_role(Message::ASSISTANT));

        let custom_msg = Message::new("function", "result");
        assert!(custom_msg.has_role("function"));
        assert!(!custom_msg.has_role(Message::SYSTEM));
    }

    #[test]
    fn test_tool_call_attachment() {
        let call = ToolCall::new("c1", "lookup_order", json!({"order": 7}));
        let msg = Message::assistant_with_calls("checking...", vec![call.clone()]);
        assert!(msg.requests_tools());
        assert_eq!(msg.tool_calls, vec![call]);
    }

    #[test]
    fn test_serialization_roundtrip_preserves_tool_fields() {
        let original = Message::assistant_with_calls(
            "let me check",
            vec![ToolCall::new("c9", "lookup_order", json!({"order": 12}))],
        );
        let json = serde_json::to_string(&original).expect("serialize");
        let parsed: Message = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(original, parsed);
        assert_eq!(parsed.tool_calls[0].arguments, json!({"order": 12}));

        let result = Message::tool_result("c9", "order shipped");
        let json = serde_json::to_string(&result).expect("serialize");
        let parsed: Message = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.tool_call_id.as_deref(), Some("c9"));
    }

    #[test]
    fn test_plain_message_serializes_without_tool_fields() {
        let json = serde_json::to_string(&Message::user("hi")).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_call_id"));
    }
}
