//! LLM integration layer.
//!
//! This module provides the interface between the session loop and the
//! remote inference endpoint.  It is organized into:
//!
//! - [`types`] -- Raw response shapes (blocking response, stream events).
//! - [`client`] -- HTTP client for the Anthropic and OpenAI APIs.
//! - [`streaming`] -- SSE parser for Anthropic incremental responses.
//! - [`streaming_openai`] -- SSE parser for OpenAI incremental responses.

pub mod client;
pub mod streaming;
pub mod streaming_openai;
pub mod types;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::conversation::ConversationHistory;
use crate::error::Result;
use crate::tools::ToolCatalog;

// Re-export the most commonly used types for convenience.
pub use client::{LlmClient, LlmClientConfig, LlmProvider};
pub use types::{Response, ResponseBlock, StreamEvent};

/// Single-pass sequence of stream events.  An `Err` item ends the turn.
pub type EventStream = BoxStream<'static, Result<StreamEvent>>;

/// The two ways of asking the model for its next turn.
///
/// Both take the full history and the tool catalog; neither retries.  Any
/// error returned here, or yielded from the event stream, is fatal to the
/// session.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// One round trip returning the complete response.
    async fn invoke_blocking(
        &self,
        history: &ConversationHistory,
        catalog: &ToolCatalog,
        model: &str,
    ) -> Result<Response>;

    /// Open a stream of incremental events for the next turn.
    async fn invoke_streaming(
        &self,
        history: &ConversationHistory,
        catalog: &ToolCatalog,
        model: &str,
    ) -> Result<EventStream>;
}
