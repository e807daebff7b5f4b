//! Human-facing seams of a chat session.
//!
//! The session never touches a terminal directly.  It pulls lines from a
//! [`HumanInput`] and pushes everything it wants shown through a
//! [`ChatDisplay`], so the same loop drives the console binary and the
//! scripted doubles used in tests.

use async_trait::async_trait;

use crate::conversation::{ToolInvocation, ToolResult};
use crate::error::Result;

/// Source of human input lines.
#[async_trait]
pub trait HumanInput: Send {
    /// Read the next line without its terminator.
    ///
    /// `Ok(None)` means end of input; the session closes normally.
    async fn read_line(&mut self) -> Result<Option<String>>;
}

/// Sink for everything the session presents to the human.
pub trait ChatDisplay: Send {
    /// Called before each human input line is read.
    fn prompt(&mut self);

    /// Text of a complete (blocking-mode) model turn.
    fn model_text(&mut self, text: &str);

    /// One streamed fragment, shown as soon as it arrives.
    fn model_fragment(&mut self, fragment: &str);

    /// The streamed turn is complete.
    fn end_model_stream(&mut self);

    /// The model asked for a tool; shown before it runs.
    fn tool_activity(&mut self, invocation: &ToolInvocation);

    /// A tool finished.  Silent unless the display cares.
    fn tool_result(&mut self, _result: &ToolResult) {}

    /// The model sent a content block the session does not understand.
    fn unrecognized(&mut self, kind: &str);
}
