//! Conversation runtime for Palaver.
//!
//! This crate holds everything between a terminal and a remote language
//! model: the conversation model, the inference client, response
//! normalization, the tool registry and dispatcher, and the session loop
//! that ties them together.
//!
//! ## Architecture
//!
//! ```text
//!  ┌────────────┐  line   ┌──────────────┐  history  ┌─────────────────┐
//!  │ HumanInput │───────> │ ChatSession  │─────────> │ InferenceClient │
//!  └────────────┘         │ (loop)       │ <──────── │ (Anthropic /    │
//!  ┌────────────┐  text   │              │ Response  │  OpenAI, SSE)   │
//!  │ChatDisplay │<─────── │              │ / events  └─────────────────┘
//!  └────────────┘         └──────┬───────┘
//!                                │ normalize → Turn
//!                         ┌──────┴───────┐
//!                         │  Dispatcher  │──> ToolRegistry ──> Tool
//!                         └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`conversation`] -- Turns, content items, and the append-only history.
//! - [`llm`] -- Inference client, SSE parsers, and raw response types.
//! - [`normalize`] -- Blocking responses and event streams into turns.
//! - [`tools`] -- Tool traits, registry, catalog, and dispatcher.
//! - [`runtime`] -- The chat session loop.
//! - [`io`] -- Human input and display seams.
//! - [`config`] -- File and environment settings.
//! - [`error`] -- Agent error types.

pub mod config;
pub mod conversation;
pub mod error;
pub mod io;
pub mod llm;
pub mod normalize;
pub mod runtime;
pub mod tools;

// Re-export the most commonly used types at the crate root.
pub use config::{DEFAULT_CONFIG_FILE, Settings, env_non_empty};
pub use conversation::{
    ContentItem, ConversationHistory, Speaker, ToolInvocation, ToolOutcome, ToolResult, Turn,
};
pub use error::{AgentError, Result};
pub use io::{ChatDisplay, HumanInput};
pub use llm::{
    EventStream, InferenceClient, LlmClient, LlmClientConfig, LlmProvider, Response,
    ResponseBlock, StreamEvent,
};
pub use normalize::{normalize_response, normalize_stream};
pub use runtime::{
    AgentConfig, ChatSession, DEFAULT_MAX_TOOL_ROUNDS, ResponseMode, SessionOutcome,
    SessionState,
};
pub use tools::{Dispatcher, Tool, ToolCatalog, ToolError, ToolHandler, ToolRegistry, ToolSpec};
