//! Built-in tools for Palaver.
//!
//! Each tool implements [`palaver_agent::Tool`]; [`builtin_registry`] wires
//! them all into a [`ToolRegistry`] for the session dispatcher.

pub mod clock;

use palaver_agent::ToolRegistry;

pub use clock::{LocalTimeInput, LocalTimeTool};

/// Registry holding every built-in tool.
pub fn builtin_registry() -> ToolRegistry {
    ToolRegistry::new().with(LocalTimeTool::new())
}
