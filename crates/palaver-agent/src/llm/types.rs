//! Raw response shapes produced by the inference client.
//!
//! These sit one step before the conversation model: a blocking call yields a
//! [`Response`] whose blocks are still untyped JSON, and a streaming call
//! yields [`StreamEvent`]s.  [`crate::normalize`] turns either into a
//! [`crate::conversation::Turn`].

use serde_json::Value;

// ---------------------------------------------------------------------------
// Blocking response
// ---------------------------------------------------------------------------

/// A complete response from a blocking inference call.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Role reported by the provider (`"assistant"` in practice).
    pub role: String,

    /// Content blocks in the order the model produced them.
    pub blocks: Vec<ResponseBlock>,
}

/// One typed content block, as received.
///
/// `kind` is the provider's `type` tag (`"text"`, `"tool_use"`, `"image"`,
/// `"thinking"`, ...).  `body` is the whole block so the normalizer can pull
/// out whatever fields the kind calls for.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseBlock {
    pub kind: String,
    pub body: Value,
}

impl ResponseBlock {
    /// Wrap a raw JSON block, reading its `type` tag.
    pub fn from_json(body: Value) -> Self {
        let kind = body["type"].as_str().unwrap_or("unknown").to_owned();
        Self { kind, body }
    }
}

// ---------------------------------------------------------------------------
// Streaming events
// ---------------------------------------------------------------------------

/// Events yielded by a streaming inference call, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The model has started its turn.
    TurnStart {
        /// Role reported by the provider.
        role: String,
    },

    /// A fragment of text to append to the running buffer.
    ContentDelta {
        /// The text fragment.
        text: String,
    },

    /// Anything else the provider sent (block boundaries, tool-input deltas,
    /// keepalives, usage updates).
    Unknown {
        /// The provider's tag for the event.
        tag: String,
    },
}
