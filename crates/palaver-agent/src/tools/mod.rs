//! Tool boundary.
//!
//! Concrete tools implement the typed [`Tool`] trait.  The runtime only ever
//! sees the object-safe [`ToolHandler`] view, which a blanket impl derives
//! from [`Tool`] by decoding the raw JSON input into [`Tool::Input`] and
//! encoding [`Tool::Output`] back into JSON.
//!
//! - [`registry`] -- name → handler map, the read-only catalog advertised to
//!   the model, and the [`Dispatcher`] that pairs every invocation with
//!   exactly one result.

pub mod registry;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use registry::{Dispatcher, ToolCatalog, ToolRegistry};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures at the tool boundary.  None of these end a session; the
/// dispatcher turns them into failure results for the model to read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// No tool is registered under the requested name.
    #[error("unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    /// The input document does not match the tool's expected shape.
    #[error("invalid input for tool `{tool_name}`: {reason}")]
    InvalidInput { tool_name: String, reason: String },

    /// The tool ran and failed.
    #[error("execution failed for tool `{tool_name}`: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

// ---------------------------------------------------------------------------
// Tool description
// ---------------------------------------------------------------------------

/// What the model is told about a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    /// Unique tool name (e.g. `get_local_time`).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema describing the tool's input document.
    pub input_schema: Value,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A strongly typed tool.
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    /// Shape the input document is decoded into before [`Tool::call`].
    type Input: DeserializeOwned + Send + 'static;
    /// Shape of the output document.
    type Output: Serialize + Send + 'static;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for [`Tool::Input`].
    fn input_schema(&self) -> Value;

    /// Run the tool.
    async fn call(&self, input: Self::Input) -> std::result::Result<Self::Output, ToolError>;
}

/// Object-safe handler stored in the [`ToolRegistry`].
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The catalog entry for this handler.
    fn spec(&self) -> ToolSpec;

    /// Decode `input`, run the handler, and encode its output.
    async fn handle(&self, input: Value) -> std::result::Result<Value, ToolError>;
}

#[async_trait]
impl<T: Tool> ToolHandler for T {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            input_schema: self.input_schema(),
        }
    }

    async fn handle(&self, input: Value) -> std::result::Result<Value, ToolError> {
        let typed: T::Input =
            serde_json::from_value(input).map_err(|e| ToolError::InvalidInput {
                tool_name: self.name().to_owned(),
                reason: e.to_string(),
            })?;

        let output = self.call(typed).await?;

        serde_json::to_value(output).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().to_owned(),
            reason: format!("output could not be encoded: {e}"),
        })
    }
}
