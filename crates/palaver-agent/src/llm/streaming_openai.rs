//! SSE stream parser for the OpenAI Chat Completions API.
//!
//! The OpenAI streaming format sends `data:` lines in standard SSE format
//! with JSON payloads containing `choices[].delta` objects.  The stream
//! terminates with a `data: [DONE]` sentinel.  A single chunk can carry both
//! the role and the first text fragment, so each line may yield several
//! [`StreamEvent`]s.

use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::llm::types::StreamEvent;

/// Parses OpenAI SSE lines into [`StreamEvent`]s.
#[derive(Debug, Default)]
pub struct OpenAiChunkParser {
    /// Whether the `[DONE]` sentinel has been received.
    done: bool,
}

impl OpenAiChunkParser {
    /// Create a new parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the `[DONE]` sentinel has been received.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a single SSE line from the stream.
    ///
    /// Returns the events carried by the line, in order.  Blank lines,
    /// comments, non-data fields and the terminator yield nothing.
    pub fn feed_line(&mut self, line: &str) -> Result<Vec<StreamEvent>> {
        let line = line.trim_end();

        // Skip empty lines, comments, and non-data lines.
        if line.is_empty() || line.starts_with(':') {
            return Ok(Vec::new());
        }

        let Some(data) = line.strip_prefix("data:") else {
            // Could be an `event:` line or other SSE field; ignore.
            return Ok(Vec::new());
        };
        let data = data.trim();

        // Check for the stream terminator.
        if data == "[DONE]" {
            self.done = true;
            return Ok(Vec::new());
        }

        let v: Value = serde_json::from_str(data).map_err(|e| AgentError::LlmParseFailed {
            reason: format!("invalid JSON in OpenAI SSE data: {e}"),
        })?;

        if let Some(err) = v.get("error").filter(|e| !e.is_null()) {
            return Err(AgentError::LlmStreamError {
                reason: err["message"]
                    .as_str()
                    .map(String::from)
                    .unwrap_or_else(|| err.to_string()),
            });
        }

        let mut events = Vec::new();

        // Navigate to choices[0].delta.
        let delta = &v["choices"][0]["delta"];
        if delta.is_null() {
            if v.get("usage").is_some_and(|u| !u.is_null()) {
                events.push(StreamEvent::Unknown {
                    tag: "usage".into(),
                });
            }
            return Ok(events);
        }

        if let Some(role) = delta["role"].as_str() {
            events.push(StreamEvent::TurnStart {
                role: role.to_owned(),
            });
        }

        if let Some(content) = delta["content"].as_str()
            && !content.is_empty()
        {
            events.push(StreamEvent::ContentDelta {
                text: content.to_owned(),
            });
        }

        if delta["tool_calls"].is_array() {
            events.push(StreamEvent::Unknown {
                tag: "tool_calls".into(),
            });
        }

        Ok(events)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
