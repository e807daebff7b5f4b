//! Agent error types.
//!
//! Everything that can end a chat session surfaces through [`AgentError`].
//! Failures that stay inside a session (bad tool input, unknown tools) are
//! modelled separately by [`crate::tools::ToolError`] and never reach this
//! type.

use uuid::Uuid;

/// Unified error type for the agent runtime.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- LLM errors ----------------------------------------------------------
    /// An HTTP request to the LLM provider failed.
    #[error("llm request failed: {reason}")]
    LlmRequestFailed { reason: String },

    /// The LLM response could not be parsed into the expected format.
    #[error("llm response parse error: {reason}")]
    LlmParseFailed { reason: String },

    /// The streaming SSE connection was interrupted or produced invalid data.
    #[error("llm stream error: {reason}")]
    LlmStreamError { reason: String },

    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    // -- Session errors ------------------------------------------------------
    /// The model kept requesting tools past the configured bound.
    #[error("session {session_id} exceeded max tool rounds ({max_rounds})")]
    ToolRoundLimitExceeded { session_id: Uuid, max_rounds: u32 },

    /// Reading from the human input source failed.
    #[error("input error: {reason}")]
    InputFailed { reason: String },

    // -- Configuration errors ------------------------------------------------
    /// Configuration validation or loading failed.
    #[error("config error: {reason}")]
    ConfigError { reason: String },
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::LlmRequestFailed {
            reason: err.to_string(),
        }
    }
}
