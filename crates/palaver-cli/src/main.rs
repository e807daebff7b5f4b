//! CLI entry point for Palaver.
//!
//! This binary provides the `palaver` command: `chat` (the default) runs an
//! interactive session against the configured provider, and `tools` lists
//! the tools the model can call.

mod cli;
mod console;
mod helpers;
mod repl;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Chat(args)) => repl::cmd_chat(args).await,
        Some(Commands::Tools) => repl::cmd_tools(),
        None => repl::cmd_chat(cli.chat).await,
    }
}
