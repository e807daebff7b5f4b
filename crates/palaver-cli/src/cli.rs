//! CLI argument definitions for Palaver.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use palaver_agent::{LlmProvider, Settings};

/// Palaver -- chat with a language model that can call local tools.
#[derive(Parser)]
#[command(
    name = "palaver",
    version,
    about = "Palaver -- terminal chat with tool-using language models",
    long_about = "Chat with a remote language model from the terminal. The model can call \
                  local tools (such as a timezone-aware clock) and see their results \
                  before answering.",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    /// Defaults to `chat` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Chat options accepted without the `chat` subcommand.
    #[command(flatten)]
    pub chat: ChatArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat session.
    Chat(ChatArgs),

    /// List the tools offered to the model.
    Tools,
}

/// Options for `palaver chat`.  Each one overrides the config file and
/// environment.
#[derive(Args, Debug, Default, Clone)]
pub struct ChatArgs {
    /// Stream the model's text as it is generated.
    #[arg(long)]
    pub stream: bool,

    /// Provider wire protocol: `anthropic` or `openai`.
    #[arg(long)]
    pub provider: Option<LlmProvider>,

    /// Model identifier.
    #[arg(long, short)]
    pub model: Option<String>,

    /// Tool rounds allowed per message; 0 removes the limit.
    #[arg(long)]
    pub max_tool_rounds: Option<u32>,

    /// Path to a TOML config file (default: ./palaver.toml if present).
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr.
    #[arg(long, short)]
    pub verbose: bool,
}

impl ChatArgs {
    /// Apply the flags that were given on top of `settings`.
    pub fn apply(&self, settings: &mut Settings) {
        if self.stream {
            settings.stream = true;
        }
        if let Some(provider) = self.provider {
            settings.provider = provider;
        }
        if let Some(model) = &self.model {
            settings.model = Some(model.clone());
        }
        if let Some(rounds) = self.max_tool_rounds {
            settings.max_tool_rounds = rounds;
        }
    }
}
