//! Model back-end selection.
//!
//! The engine never speaks to a vendor API itself: callers register one
//! [`ModelFactory`] per [`ProviderId`] at startup, and `AgentThink` resolves
//! the factory from the turn's [`ModelParams`]. The orchestrator only needs
//! the two operations on [`ChatModel`]: `invoke` and `bind_tools`.
//!
//! Unknown or unregistered providers are fatal configuration errors for the
//! turn; there is nothing sensible to degrade to when no model exists.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::Message;
use crate::tools::ToolSpec;

/// The set of language-model back-ends the console can be configured with.
///
/// A closed enum rather than a free-form string: a typo'd provider fails at
/// the selection boundary with [`ModelError::UnknownProvider`] instead of
/// surfacing later as a missing dispatch entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
}

impl ProviderId {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::Anthropic => "anthropic",
            ProviderId::Gemini => "gemini",
            ProviderId::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderId::OpenAi),
            "anthropic" => Ok(ProviderId::Anthropic),
            "gemini" => Ok(ProviderId::Gemini),
            "ollama" => Ok(ProviderId::Ollama),
            other => Err(ModelError::UnknownProvider(other.to_string())),
        }
    }
}

/// Per-invocation model-selection parameters.
///
/// Supplied fresh on every turn and carried in in-memory state only; they are
/// never part of a durable checkpoint's business meaning.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelParams {
    pub provider: ProviderId,
    pub model: String,
    pub api_key: String,
    /// Override for self-hosted or proxied back-ends.
    pub base_url: Option<String>,
}

impl fmt::Debug for ModelParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelParams")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Errors from model selection and invocation.
#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("unknown provider: {0}")]
    #[diagnostic(
        code(threadloom::providers::unknown),
        help("Valid providers: openai, anthropic, gemini, ollama.")
    )]
    UnknownProvider(String),

    #[error("no factory registered for provider {0}")]
    #[diagnostic(
        code(threadloom::providers::not_registered),
        help("Register a ModelFactory for this provider when building the ModelRegistry.")
    )]
    NotRegistered(ProviderId),

    #[error("invalid model configuration: {0}")]
    #[diagnostic(code(threadloom::providers::config))]
    InvalidConfiguration(String),

    #[error("model invocation failed ({provider}): {message}")]
    #[diagnostic(code(threadloom::providers::invocation))]
    Invocation {
        provider: ProviderId,
        message: String,
    },
}

/// The uniform adapter every back-end hides behind.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Invoke the model with the full message history plus the turn's system
    /// directive; returns the assistant reply, which may carry tool calls.
    async fn invoke(&self, history: &[Message], directive: &str) -> Result<Message, ModelError>;

    /// Return an equivalent model with the given tool set bound, so replies
    /// may request those tools.
    fn bind_tools(self: Arc<Self>, tools: Vec<ToolSpec>) -> Arc<dyn ChatModel>;
}

/// Factory producing a configured [`ChatModel`] from per-turn parameters.
pub trait ModelFactory: Send + Sync {
    fn create(&self, params: &ModelParams) -> Result<Arc<dyn ChatModel>, ModelError>;
}

impl<F> ModelFactory for F
where
    F: Fn(&ModelParams) -> Result<Arc<dyn ChatModel>, ModelError> + Send + Sync,
{
    fn create(&self, params: &ModelParams) -> Result<Arc<dyn ChatModel>, ModelError> {
        self(params)
    }
}

/// Immutable map of provider → factory, built once at startup.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    factories: FxHashMap<ProviderId, Arc<dyn ModelFactory>>,
}

impl ModelRegistry {
    #[must_use]
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::default()
    }

    /// Resolve the back-end for the given parameters.
    pub fn resolve(&self, params: &ModelParams) -> Result<Arc<dyn ChatModel>, ModelError> {
        let factory = self
            .factories
            .get(&params.provider)
            .ok_or(ModelError::NotRegistered(params.provider))?;
        factory.create(params)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("providers", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Fluent builder for [`ModelRegistry`].
#[derive(Default)]
pub struct ModelRegistryBuilder {
    factories: FxHashMap<ProviderId, Arc<dyn ModelFactory>>,
}

impl ModelRegistryBuilder {
    #[must_use]
    pub fn with_factory(
        mut self,
        provider: ProviderId,
        factory: Arc<dyn ModelFactory>,
    ) -> Self {
        self.factories.insert(provider, factory);
        self
    }

    #[must_use]
    pub fn build(self) -> ModelRegistry {
        ModelRegistry {
            factories: self.factories,
        }
    }
}
