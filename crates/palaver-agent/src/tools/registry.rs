//! Tool registry, catalog, and dispatcher.
//!
//! The registry is built once at startup and then shared read-only behind an
//! [`Arc`].  The [`ToolCatalog`] is the snapshot of tool specs advertised to
//! the model on every inference call; the [`Dispatcher`] resolves a
//! model-issued invocation against the registry and always yields a
//! [`ToolResult`] carrying the invocation id, whether or not the tool ran.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::{ToolError, ToolHandler, ToolSpec};
use crate::conversation::ToolResult;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// A registered handler together with its cached spec.
struct Entry {
    spec: ToolSpec,
    handler: Arc<dyn ToolHandler>,
}

/// Name → handler map.
#[derive(Default)]
pub struct ToolRegistry {
    entries: BTreeMap<String, Entry>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under the name its spec declares.
    ///
    /// A handler registered under an existing name replaces the old one.
    pub fn register(&mut self, handler: impl ToolHandler + 'static) -> &mut Self {
        let spec = handler.spec();
        let name = spec.name.clone();

        if self.entries.contains_key(&name) {
            warn!(tool = %name, "replacing previously registered tool");
        } else {
            debug!(tool = %name, "tool registered");
        }

        self.entries.insert(
            name,
            Entry {
                spec,
                handler: Arc::new(handler),
            },
        );
        self
    }

    /// Builder-style [`ToolRegistry::register`].
    pub fn with(mut self, handler: impl ToolHandler + 'static) -> Self {
        self.register(handler);
        self
    }

    /// Look up a handler by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.entries.get(name).map(|e| &e.handler)
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot the specs of every registered tool.
    pub fn catalog(&self) -> ToolCatalog {
        ToolCatalog {
            specs: self.entries.values().map(|e| e.spec.clone()).collect(),
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Read-only list of tool specs, sorted by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCatalog {
    specs: Vec<ToolSpec>,
}

impl ToolCatalog {
    /// A catalog advertising no tools.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolSpec> {
        self.specs.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Runs model-issued tool invocations against a shared registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// The catalog for the underlying registry.
    pub fn catalog(&self) -> ToolCatalog {
        self.registry.catalog()
    }

    /// Run tool `name` for invocation `invocation_id`.
    ///
    /// Never fails: unknown tools, undecodable input and handler errors all
    /// come back as failure results tagged with `invocation_id`.
    pub async fn dispatch(&self, name: &str, invocation_id: &str, input: Value) -> ToolResult {
        let outcome = match self.registry.get(name) {
            Some(handler) => {
                debug!(tool = %name, id = %invocation_id, "executing tool");
                handler.handle(input).await
            }
            None => Err(ToolError::UnknownTool {
                tool_name: name.to_owned(),
            }),
        };

        match outcome {
            Ok(output) => ToolResult::success(invocation_id, output),
            Err(e) => {
                warn!(tool = %name, id = %invocation_id, error = %e, "tool execution failed");
                ToolResult::failure(invocation_id, format!("Error: {e}"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::conversation::ToolOutcome;
    use crate::tools::Tool;

    struct Shout;

    #[derive(Deserialize)]
    struct ShoutInput {
        text: String,
    }

    #[async_trait]
    impl Tool for Shout {
        type Input = ShoutInput;
        type Output = String;

        fn name(&self) -> &str {
            "shout"
        }

        fn description(&self) -> &str {
            "Upper-case the given text"
        }

        fn input_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            })
        }

        async fn call(&self, input: ShoutInput) -> Result<String, ToolError> {
            if input.text.is_empty() {
                return Err(ToolError::ExecutionFailed {
                    tool_name: "shout".into(),
                    reason: "nothing to shout".into(),
                });
            }
            Ok(input.text.to_uppercase())
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(ToolRegistry::new().with(Shout)))
    }

    #[tokio::test]
    async fn dispatch_success_keeps_invocation_id() {
        let result = dispatcher()
            .dispatch("shout", "tu_1", json!({"text": "hi"}))
            .await;

        assert_eq!(result.invocation_id, "tu_1");
        assert_eq!(result.outcome, ToolOutcome::Success(json!("HI")));
    }

    #[tokio::test]
    async fn unknown_tool_yields_failure_result() {
        let result = dispatcher().dispatch("whisper", "tu_2", json!({})).await;

        assert_eq!(result.invocation_id, "tu_2");
        match result.outcome {
            ToolOutcome::Failure(msg) => assert!(msg.contains("unknown tool: whisper"), "{msg}"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_input_yields_failure_result() {
        let result = dispatcher()
            .dispatch("shout", "tu_3", json!({"txt": "typo"}))
            .await;

        assert_eq!(result.invocation_id, "tu_3");
        match result.outcome {
            ToolOutcome::Failure(msg) => {
                assert!(msg.contains("invalid input for tool `shout`"), "{msg}");
                assert!(msg.contains("text"), "{msg}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn handler_failure_yields_failure_result() {
        let result = dispatcher()
            .dispatch("shout", "tu_4", json!({"text": ""}))
            .await;

        assert!(result.is_error());
        assert!(result.content_text().contains("nothing to shout"));
    }

    #[test]
    fn catalog_lists_registered_specs() {
        let registry = ToolRegistry::new().with(Shout);
        let catalog = registry.catalog();

        assert_eq!(catalog.len(), 1);
        let spec = catalog.get("shout").unwrap();
        assert_eq!(spec.description, "Upper-case the given text");
        assert_eq!(spec.input_schema["required"][0], "text");
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn registering_same_name_replaces() {
        let mut registry = ToolRegistry::new();
        registry.register(Shout).register(Shout);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names().collect::<Vec<_>>(), ["shout"]);
    }
}
