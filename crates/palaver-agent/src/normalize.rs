//! Response normalization.
//!
//! Both response modes end up as a single [`Turn`] before anything else in
//! the session sees them.  A blocking [`Response`] keeps its block order; a
//! stream is folded into one text item, since streamed turns carry no tool
//! invocations.

use futures::StreamExt;
use serde_json::Value;

use crate::conversation::{ContentItem, Speaker, ToolInvocation, Turn};
use crate::error::Result;
use crate::llm::{EventStream, Response, ResponseBlock, StreamEvent};

/// Map a provider role string onto a [`Speaker`].
fn speaker_for_role(role: &str) -> Speaker {
    match role {
        "user" => Speaker::Human,
        _ => Speaker::Model,
    }
}

/// Convert a blocking response into a turn.
///
/// `text` blocks become [`ContentItem::Text`], well-formed `tool_use` blocks
/// become [`ContentItem::ToolInvocation`], and everything else (including a
/// `tool_use` block missing its id or name) becomes
/// [`ContentItem::Unrecognized`].
pub fn normalize_response(response: Response) -> Turn {
    let content = response.blocks.into_iter().map(normalize_block).collect();

    Turn {
        speaker: speaker_for_role(&response.role),
        content,
    }
}

fn normalize_block(block: ResponseBlock) -> ContentItem {
    let ResponseBlock { kind, mut body } = block;

    match kind.as_str() {
        "text" => match body["text"].as_str() {
            Some(text) => ContentItem::Text(text.to_owned()),
            None => {
                tracing::warn!("text block without a text field");
                ContentItem::Unrecognized { kind }
            }
        },
        "tool_use" => {
            let id = body["id"].as_str().map(str::to_owned);
            let name = body["name"].as_str().map(str::to_owned);
            match (id, name) {
                (Some(id), Some(name)) => {
                    let input = match body.get_mut("input").map(Value::take) {
                        Some(Value::Null) | None => Value::Object(Default::default()),
                        Some(input) => input,
                    };
                    ContentItem::ToolInvocation(ToolInvocation { id, name, input })
                }
                _ => {
                    tracing::warn!(block = %body, "tool_use block without id or name");
                    ContentItem::Unrecognized { kind }
                }
            }
        }
        _ => {
            tracing::warn!(kind = %kind, "unrecognized content block");
            ContentItem::Unrecognized { kind }
        }
    }
}

/// Drain an event stream into a turn.
///
/// `on_text` is called with every fragment as it arrives so the caller can
/// render incrementally.  The resulting turn holds exactly one text item,
/// empty if the model sent no text.  The first error ends consumption and
/// is returned.
pub async fn normalize_stream<F>(mut events: EventStream, mut on_text: F) -> Result<Turn>
where
    F: FnMut(&str),
{
    let mut speaker = Speaker::Model;
    let mut buffer = String::new();

    while let Some(event) = events.next().await {
        match event? {
            StreamEvent::TurnStart { role } => {
                speaker = speaker_for_role(&role);
            }
            StreamEvent::ContentDelta { text } => {
                on_text(&text);
                buffer.push_str(&text);
            }
            StreamEvent::Unknown { tag } => {
                tracing::debug!(tag = %tag, "ignoring stream event");
            }
        }
    }

    Ok(Turn {
        speaker,
        content: vec![ContentItem::Text(buffer)],
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
