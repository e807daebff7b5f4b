//! SSE stream parser for the Anthropic Messages API.
//!
//! The Anthropic streaming format sends `event:` and `data:` lines in
//! standard SSE format.  This module parses those lines into the
//! provider-neutral [`StreamEvent`]s: the message start becomes
//! [`StreamEvent::TurnStart`], text deltas become
//! [`StreamEvent::ContentDelta`], and everything else is passed through as
//! [`StreamEvent::Unknown`].  `message_stop` ends the stream.

use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::llm::types::StreamEvent;

/// Parses raw SSE lines from the Anthropic Messages API stream.
///
/// Accumulates partial state across calls because SSE events span multiple
/// lines (`event:` followed by `data:`).
#[derive(Debug, Default)]
pub struct SseParser {
    /// The most recently seen `event:` type.
    current_event_type: Option<String>,

    /// Whether `message_stop` has been received.
    done: bool,
}

impl SseParser {
    /// Create a new parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the terminating `message_stop` has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a single line from the SSE stream.
    ///
    /// Returns `Some(event)` when a complete event has been parsed, `None` for
    /// comment lines, blank lines, the `event:` prefix line (which just sets
    /// internal state for the next `data:` line), and the stream terminator.
    pub fn parse_line(&mut self, line: &str) -> Result<Option<StreamEvent>> {
        let line = line.trim_end();

        // SSE comment lines start with `:`.
        if line.starts_with(':') || line.is_empty() {
            return Ok(None);
        }

        // `event: <type>`: stash the type for the next `data:` line.
        if let Some(event_type) = line.strip_prefix("event:") {
            self.current_event_type = Some(event_type.trim().to_owned());
            return Ok(None);
        }

        // `data: <json>`: combine with the stashed event type.
        if let Some(data) = line.strip_prefix("data:") {
            let event_type = self
                .current_event_type
                .take()
                .unwrap_or_else(|| "unknown".into());

            return self.parse_event(&event_type, data.trim());
        }

        // Unknown line format; ignore gracefully.
        tracing::trace!(line, "ignoring unrecognised SSE line");
        Ok(None)
    }

    /// Parse a (event_type, data_json) pair into a [`StreamEvent`].
    fn parse_event(&mut self, event_type: &str, data: &str) -> Result<Option<StreamEvent>> {
        match event_type {
            "message_start" => {
                let v = parse_json(data)?;
                let role = v["message"]["role"].as_str().unwrap_or("assistant");
                Ok(Some(StreamEvent::TurnStart {
                    role: role.to_owned(),
                }))
            }

            "content_block_delta" => {
                let v = parse_json(data)?;
                let delta = &v["delta"];
                match delta["type"].as_str() {
                    Some("text_delta") => Ok(Some(StreamEvent::ContentDelta {
                        text: json_string(delta, "text"),
                    })),
                    other => Ok(Some(StreamEvent::Unknown {
                        tag: other.unwrap_or("content_block_delta").to_owned(),
                    })),
                }
            }

            "message_stop" => {
                self.done = true;
                Ok(None)
            }

            "error" => {
                let v = parse_json(data)?;
                let kind = v["error"]["type"].as_str().unwrap_or("error");
                let message = v["error"]["message"].as_str().unwrap_or_default();
                Err(AgentError::LlmStreamError {
                    reason: format!("{kind}: {message}"),
                })
            }

            // `[DONE]` sent by some proxies in place of `message_stop`.
            _ if data == "[DONE]" => {
                self.done = true;
                Ok(None)
            }

            other => Ok(Some(StreamEvent::Unknown {
                tag: other.to_owned(),
            })),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a JSON string, mapping errors to [`AgentError::LlmParseFailed`].
fn parse_json(data: &str) -> Result<Value> {
    serde_json::from_str(data).map_err(|e| AgentError::LlmParseFailed {
        reason: format!("invalid JSON in SSE data: {e}"),
    })
}

/// Extract a string field from a JSON value, returning an empty string if
/// missing.
fn json_string(v: &Value, field: &str) -> String {
    v[field].as_str().unwrap_or_default().to_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
