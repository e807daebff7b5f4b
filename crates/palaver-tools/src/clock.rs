//! Clock tool: current local time in a named timezone.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use palaver_agent::{Tool, ToolError};
use serde::Deserialize;
use serde_json::{Value, json};

/// Name the model uses to call [`LocalTimeTool`].
pub const TOOL_NAME: &str = "get_local_time";

/// Source of the current instant.
pub type ClockFn = fn() -> DateTime<Utc>;

/// Input document for [`LocalTimeTool`].
#[derive(Debug, Clone, Deserialize)]
pub struct LocalTimeInput {
    /// IANA timezone name, e.g. `Asia/Singapore`.
    pub timezone: String,
}

/// Reports the current time in an IANA timezone as an RFC 3339 string.
#[derive(Debug, Clone, Copy)]
pub struct LocalTimeTool {
    now: ClockFn,
}

impl LocalTimeTool {
    /// A tool reading the system clock.
    pub fn new() -> Self {
        Self { now: Utc::now }
    }

    /// A tool reading `now` instead of the system clock.
    pub fn with_clock(now: ClockFn) -> Self {
        Self { now }
    }
}

impl Default for LocalTimeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for LocalTimeTool {
    type Input = LocalTimeInput;
    type Output = String;

    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Get the current local date and time in a given IANA timezone \
         (for example `Asia/Singapore` or `America/New_York`). \
         Returns an RFC 3339 timestamp including the UTC offset."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "timezone": {
                    "type": "string",
                    "description": "IANA timezone name, e.g. Asia/Singapore"
                }
            },
            "required": ["timezone"]
        })
    }

    async fn call(&self, input: LocalTimeInput) -> Result<String, ToolError> {
        let name = input.timezone.trim();
        let tz: Tz = name.parse().map_err(|e| ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason: format!("unknown timezone `{name}`: {e}"),
        })?;

        let local = (self.now)().with_timezone(&tz);
        tracing::debug!(timezone = %tz, time = %local, "resolved local time");
        Ok(local.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}
