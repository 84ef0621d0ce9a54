#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use threadloom::context::{DirectoryError, RawMessage, RawSession, SessionDirectory};
use threadloom::message::Message;
use threadloom::providers::{
    ChatModel, ModelError, ModelParams, ModelRegistry, ProviderId,
};
use threadloom::state::{PersonaConfig, SessionContext};
use threadloom::tools::{ToolError, ToolHandler, ToolSpec};

pub fn session() -> SessionContext {
    SessionContext {
        protocol_number: "P1".into(),
        attendance_id: "A1".into(),
        contact_id: "C1".into(),
        base_url: "https://console.example".into(),
    }
}

pub fn persona(tools: &[&str]) -> PersonaConfig {
    PersonaConfig {
        persona_id: "support".into(),
        system_prompt: "You are the support assistant.".into(),
        available_tools: tools.iter().map(|t| t.to_string()).collect(),
    }
}

pub fn model_params() -> ModelParams {
    ModelParams {
        provider: ProviderId::OpenAi,
        model: "gpt-4o".into(),
        api_key: "test-key".into(),
        base_url: None,
    }
}

pub fn raw_message(text: &str, hour: u32, minute: u32, from_contact: bool) -> RawMessage {
    RawMessage {
        text: text.into(),
        sent_at: Utc.with_ymd_and_hms(2025, 6, 1, hour, minute, 0).unwrap(),
        from_contact,
        automated: false,
    }
}

/// In-memory [`SessionDirectory`] with call counters.
#[derive(Default)]
pub struct FakeDirectory {
    pub sessions: Vec<RawSession>,
    pub session_messages: Vec<RawMessage>,
    pub fail: bool,
    pub contact_listings: AtomicUsize,
    pub session_listings: AtomicUsize,
}

impl FakeDirectory {
    pub fn with_sessions(sessions: Vec<RawSession>) -> Self {
        Self {
            sessions,
            ..Self::default()
        }
    }
}

#[async_trait]
impl SessionDirectory for FakeDirectory {
    async fn sessions_for_contact(
        &self,
        _base_url: &str,
        _contact_id: &str,
    ) -> Result<Vec<RawSession>, DirectoryError> {
        self.contact_listings.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DirectoryError::Status { status: 503 });
        }
        Ok(self.sessions.clone())
    }

    async fn messages_for_session(
        &self,
        _base_url: &str,
        _session_id: &str,
    ) -> Result<Vec<RawMessage>, DirectoryError> {
        self.session_listings.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DirectoryError::Status { status: 503 });
        }
        Ok(self.session_messages.clone())
    }
}

/// A model that replays a fixed script of replies and records the tool
/// names it was bound with.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Message>>,
    pub bound_tools: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Message>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            bound_tools: Mutex::new(Vec::new()),
        })
    }

    pub fn bound(&self) -> Vec<String> {
        self.bound_tools.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn invoke(&self, _history: &[Message], _directive: &str) -> Result<Message, ModelError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(ModelError::Invocation {
                provider: ProviderId::OpenAi,
                message: "scripted replies exhausted".into(),
            })
    }

    fn bind_tools(self: Arc<Self>, tools: Vec<ToolSpec>) -> Arc<dyn ChatModel> {
        self.bound_tools
            .lock()
            .unwrap()
            .extend(tools.iter().map(|t| t.name.clone()));
        self
    }
}

/// Registry serving `model` for every provider request.
pub fn registry_for(model: Arc<ScriptedModel>) -> ModelRegistry {
    let factory = move |_params: &ModelParams| -> Result<Arc<dyn ChatModel>, ModelError> {
        Ok(model.clone())
    };
    ModelRegistry::builder()
        .with_factory(ProviderId::OpenAi, Arc::new(factory))
        .build()
}

/// Echoes its arguments back as result text.
pub struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes the provided arguments."
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        Ok(arguments.to_string())
    }
}

/// Always fails, for error-to-text coverage.
pub struct BrokenTool;

#[async_trait]
impl ToolHandler for BrokenTool {
    fn name(&self) -> &str {
        "broken"
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        Err(ToolError::Failed {
            tool: "broken".into(),
            message: "upstream exploded".into(),
        })
    }
}
