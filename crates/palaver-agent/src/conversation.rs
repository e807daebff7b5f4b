//! Conversation model.
//!
//! A chat session is an append-only [`ConversationHistory`] of [`Turn`]s.
//! Each turn is attributed to a [`Speaker`] and holds an ordered list of
//! [`ContentItem`]s.  Tool results travel back to the model inside a
//! human-attributed turn, which is what both supported wire protocols expect.

use serde_json::Value;

// ---------------------------------------------------------------------------
// Speaker
// ---------------------------------------------------------------------------

/// Who contributed a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// The human operator, or tool results fed back on their behalf.
    Human,
    /// The language model.
    Model,
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::Model => write!(f, "model"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tool invocation / result
// ---------------------------------------------------------------------------

/// A model-issued request to run a named tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    /// Identifier assigned by the model; the paired result must echo it.
    pub id: String,
    /// Name of the tool to run.
    pub name: String,
    /// Structured input document.
    pub input: Value,
}

/// Outcome of a single tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// The handler produced an output document.
    Success(Value),
    /// The tool could not run or failed; the message is shown to the model.
    Failure(String),
}

/// The paired outcome for one [`ToolInvocation`].
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// The [`ToolInvocation::id`] this result answers.
    pub invocation_id: String,
    /// Success payload or failure message.
    pub outcome: ToolOutcome,
}

impl ToolResult {
    /// Build a successful result.
    pub fn success(invocation_id: impl Into<String>, output: Value) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            outcome: ToolOutcome::Success(output),
        }
    }

    /// Build a failed result.
    pub fn failure(invocation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            outcome: ToolOutcome::Failure(message.into()),
        }
    }

    /// Whether this result reports a failure.
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Failure(_))
    }

    /// Render the outcome as text for the wire.
    ///
    /// String outputs are passed through verbatim; any other document is
    /// serialized as JSON.
    pub fn content_text(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success(Value::String(s)) => s.clone(),
            ToolOutcome::Success(other) => other.to_string(),
            ToolOutcome::Failure(message) => message.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Content items
// ---------------------------------------------------------------------------

/// The smallest unit of conversation content.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    /// Plain text.
    Text(String),
    /// A request from the model to run a tool.
    ToolInvocation(ToolInvocation),
    /// The result of a tool run, sent back to the model.
    ToolResult(ToolResult),
    /// A block the runtime does not understand (images, reasoning, ...).
    Unrecognized {
        /// The provider's tag for the block.
        kind: String,
    },
}

// ---------------------------------------------------------------------------
// Turn
// ---------------------------------------------------------------------------

/// One attributed contribution to the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub speaker: Speaker,
    pub content: Vec<ContentItem>,
}

impl Turn {
    /// A human turn carrying a single line of text.
    pub fn human_text(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Human,
            content: vec![ContentItem::Text(text.into())],
        }
    }

    /// A human-attributed turn carrying tool results, in request order.
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            speaker: Speaker::Human,
            content: results.into_iter().map(ContentItem::ToolResult).collect(),
        }
    }

    /// A model turn with the given content.
    pub fn model(content: Vec<ContentItem>) -> Self {
        Self {
            speaker: Speaker::Model,
            content,
        }
    }

    /// Concatenation of every text item in the turn.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Tool invocations in the order the model emitted them.
    pub fn tool_invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.content.iter().filter_map(|item| match item {
            ContentItem::ToolInvocation(inv) => Some(inv),
            _ => None,
        })
    }

    /// Tool results carried by this turn.
    pub fn tool_result_items(&self) -> impl Iterator<Item = &ToolResult> {
        self.content.iter().filter_map(|item| match item {
            ContentItem::ToolResult(res) => Some(res),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Append-only record of a chat session.
///
/// Turns cannot be removed or edited once pushed.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// All turns, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The most recent turn.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
