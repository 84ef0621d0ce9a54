//! Tool invocation boundary.
//!
//! A registry mapping tool name → handler, supplied once at startup and
//! immutable for the process lifetime. The orchestrator only needs two
//! things from this boundary: name-based dispatch, and a uniform
//! error-to-text conversion so a failing handler feeds the model an error
//! message instead of crashing the turn.
//!
//! The reserved completion sentinel (see [`crate::control::COMPLETION_TOOL`])
//! is never dispatched here; the registry refuses to register a handler
//! under that name.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use thiserror::Error;

use crate::control::COMPLETION_TOOL;
use crate::message::ToolCall;

/// Declarative description of a tool, handed to the model when binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub parameters: Value,
}

/// Errors surfaced by tool handlers.
///
/// These never cross the orchestrator boundary as failures; `ToolExec`
/// folds them into result text for the model to react to.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    #[diagnostic(code(threadloom::tools::unknown))]
    Unknown(String),

    #[error("invalid arguments for {tool}: {message}")]
    #[diagnostic(code(threadloom::tools::arguments))]
    InvalidArguments { tool: String, message: String },

    #[error("tool {tool} failed: {message}")]
    #[diagnostic(code(threadloom::tools::failed))]
    Failed { tool: String, message: String },
}

/// An executable tool.
///
/// Handlers are expected to be read-only against the host system or clearly
/// scoped, and to trap their own transport errors into `ToolError` rather
/// than panicking.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Registry key and the name the model calls this tool by.
    fn name(&self) -> &str;

    /// Short human/model-readable purpose statement.
    fn description(&self) -> &str {
        ""
    }

    /// JSON Schema of the accepted arguments.
    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    /// Execute with the given arguments, producing result text.
    async fn execute(&self, arguments: Value) -> Result<String, ToolError>;
}

/// Errors raised while assembling the registry at startup.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolRegistryError {
    #[error("tool name {0:?} is reserved for loop termination")]
    #[diagnostic(
        code(threadloom::tools::reserved_name),
        help("Pick another name; the completion sentinel is intercepted before dispatch.")
    )]
    ReservedName(String),

    #[error("duplicate tool registration: {0}")]
    #[diagnostic(code(threadloom::tools::duplicate))]
    Duplicate(String),
}

/// Immutable name → handler map.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: FxHashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Resolve a persona's requested tool names into specs for binding.
    ///
    /// Unknown names are dropped, not failed: personas are configured
    /// outside this process and may reference tools this deployment does
    /// not carry.
    #[must_use]
    pub fn resolve_specs(&self, requested: &[String]) -> Vec<ToolSpec> {
        let mut specs = Vec::with_capacity(requested.len());
        for name in requested {
            match self.handlers.get(name) {
                Some(handler) => specs.push(ToolSpec {
                    name: handler.name().to_string(),
                    description: handler.description().to_string(),
                    parameters: handler.parameters(),
                }),
                None => {
                    tracing::debug!(tool = %name, "persona requested unregistered tool; dropping");
                }
            }
        }
        specs
    }

    /// Execute one requested call.
    ///
    /// Missing handlers come back as `ToolError::Unknown`; callers fold any
    /// error into result text per the boundary contract.
    pub async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let handler = self
            .get(&call.name)
            .ok_or_else(|| ToolError::Unknown(call.name.clone()))?;
        handler.execute(call.arguments.clone()).await
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Fluent builder; validation happens at [`build`](Self::build).
#[derive(Default)]
pub struct ToolRegistryBuilder {
    handlers: Vec<Arc<dyn ToolHandler>>,
}

impl ToolRegistryBuilder {
    #[must_use]
    pub fn register(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn build(self) -> Result<ToolRegistry, ToolRegistryError> {
        let mut map: FxHashMap<String, Arc<dyn ToolHandler>> = FxHashMap::default();
        for handler in self.handlers {
            let name = handler.name().to_string();
            if name == COMPLETION_TOOL {
                return Err(ToolRegistryError::ReservedName(name));
            }
            if map.insert(name.clone(), handler).is_some() {
                return Err(ToolRegistryError::Duplicate(name));
            }
        }
        Ok(ToolRegistry { handlers: map })
    }
}
