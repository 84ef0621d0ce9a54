use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where in the engine a recoverable error surfaced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ErrorScope {
    /// A node, identified by its encoded kind and the checkpoint sequence
    /// it was executing under.
    Node { kind: String, checkpoint: u64 },
    /// A context-provider operation ("full_history" or "incremental").
    Context { operation: String },
    /// A tool handler, by name.
    Tool { name: String },
    /// The turn runner itself.
    Runner { thread: String },
    /// Anything without a narrower home.
    #[default]
    Engine,
}

/// A recoverable error event folded into conversation state.
///
/// These are the §7 class (a)/(b) failures: they are recorded for audit and
/// (in textual form) shown to the model, but they never abort the turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEvent {
    #[serde(default = "Utc::now")]
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub scope: ErrorScope,
    pub message: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ErrorEvent {
    /// Create a context-provider error event.
    pub fn context(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Context {
                operation: operation.into(),
            },
            message: message.into(),
            tags: vec!["context".into()],
        }
    }

    /// Create a tool-execution error event.
    pub fn tool(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Tool { name: name.into() },
            message: message.into(),
            tags: vec!["tool".into()],
        }
    }

    /// Create a runner-scoped error event.
    pub fn runner(thread: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Runner {
                thread: thread.into(),
            },
            message: message.into(),
            tags: vec!["runner".into()],
        }
    }

    /// Attach a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

impl Default for ErrorEvent {
    fn default() -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::default(),
            message: String::new(),
            tags: Vec::new(),
        }
    }
}
