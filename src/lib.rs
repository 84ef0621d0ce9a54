//! # threadloom: Checkpointed Agent Orchestration
//!
//! threadloom turns one user utterance into either a direct reply or a
//! sequence of tool invocations, persisting a checkpoint after every node
//! so a multi-turn conversation thread survives process restarts.
//!
//! ## Core Concepts
//!
//! - **Messages**: conversation turn objects with role-based typing and
//!   structured tool-call requests
//! - **State**: versioned, channel-based conversation state with an
//!   incoming-message watermark
//! - **Nodes**: the fixed turn graph — context injection, a model think
//!   step, and a tool-execution loop
//! - **Checkpointer**: pluggable durable persistence forming a parent-linked
//!   chain per thread
//! - **Context Providers**: read-only adapters turning host-platform
//!   transcripts into injected context
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use threadloom::providers::{ModelParams, ModelRegistry, ProviderId};
//! use threadloom::runtimes::{InMemoryCheckpointer, TurnRequest, TurnRunner};
//! use threadloom::context::HttpSessionDirectory;
//! use threadloom::state::{PersonaConfig, SessionContext};
//! use threadloom::tools::ToolRegistry;
//!
//! # async fn example(models: ModelRegistry) -> Result<(), Box<dyn std::error::Error>> {
//! let runner = TurnRunner::new(
//!     Arc::new(InMemoryCheckpointer::new()),
//!     Arc::new(HttpSessionDirectory::new()?),
//!     Arc::new(ToolRegistry::builder().build()?),
//!     Arc::new(models),
//! );
//!
//! let reply = runner
//!     .handle_turn(TurnRequest {
//!         query: "what is the status of my order?".into(),
//!         persona: PersonaConfig {
//!             persona_id: "support".into(),
//!             system_prompt: "You are the support assistant.".into(),
//!             available_tools: vec!["lookup_order".into()],
//!         },
//!         session: SessionContext {
//!             protocol_number: "P1".into(),
//!             attendance_id: "A1".into(),
//!             contact_id: "C1".into(),
//!             base_url: "https://console.example".into(),
//!         },
//!         model: ModelParams {
//!             provider: ProviderId::OpenAi,
//!             model: "gpt-4o".into(),
//!             api_key: std::env::var("OPENAI_API_KEY")?,
//!             base_url: None,
//!         },
//!     })
//!     .await;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`message`] - Message types and construction utilities
//! - [`state`] - Conversation state, snapshots, and session identity
//! - [`node`] - Node trait and execution primitives
//! - [`nodes`] - The three executable nodes of the turn graph
//! - [`control`] - Routing rules and the completion sentinel
//! - [`context`] - Transcript fetching, ordering, and rendering
//! - [`tools`] - Tool registry and the invocation boundary
//! - [`providers`] - Model back-end selection
//! - [`runtimes`] - Turn runner and checkpoint persistence
//! - [`channels`] - Versioned state storage
//! - [`reducers`] - State merge strategies

pub mod channels;
pub mod context;
pub mod control;
pub mod message;
pub mod node;
pub mod nodes;
pub mod providers;
pub mod reducers;
pub mod runtimes;
pub mod state;
pub mod telemetry;
pub mod tools;
pub mod types;
pub mod utils;
