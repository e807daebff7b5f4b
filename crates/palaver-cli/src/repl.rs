//! Subcommands: `palaver chat` and `palaver tools`.

use std::sync::Arc;

use anyhow::{Context, Result};
use palaver_agent::{ChatSession, Dispatcher, LlmClient, Settings};
use palaver_tools::builtin_registry;
use tracing::info;

use crate::cli::ChatArgs;
use crate::console::{ConsoleDisplay, ConsoleInput};
use crate::helpers::{init_tracing, process_env};

/// Run an interactive chat session on the terminal.
pub async fn cmd_chat(args: ChatArgs) -> Result<()> {
    // 1. Initialize tracing.
    init_tracing(if args.verbose { "debug" } else { "warn" });

    // 2. Resolve settings: file, then environment, then flags.
    let mut settings =
        Settings::load(args.config.as_deref()).context("failed to load configuration")?;
    settings
        .apply_env(process_env)
        .context("invalid environment configuration")?;
    args.apply(&mut settings);

    // 3. Build the LLM client.
    let client_config = settings
        .to_client_config(process_env)
        .context("cannot configure LLM provider")?;
    let client = LlmClient::new(client_config).context("failed to create LLM client")?;
    info!(
        provider = %settings.provider,
        model = %settings.model(),
        "LLM client ready"
    );

    // 4. Register tools.
    let dispatcher = Dispatcher::new(Arc::new(builtin_registry()));
    let agent_config = settings.to_agent_config();

    // 5. Print startup banner.
    println!();
    println!("  Palaver v{}", env!("CARGO_PKG_VERSION"));
    println!("  Provider: {}", settings.provider);
    println!("  Model: {}", settings.model());
    println!("  Mode: {}", agent_config.mode);
    println!("  Type your message, Ctrl-D to exit.");
    println!();

    // 6. Run the session until end of input.
    let mut session = ChatSession::new(Arc::new(client), dispatcher, agent_config);
    let mut input = ConsoleInput::stdin();
    let mut display = ConsoleDisplay::stdout();

    let outcome = session
        .run(&mut input, &mut display)
        .await
        .context("chat session ended with an error")?;

    println!();
    info!(
        session_id = %outcome.session_id,
        turns = outcome.turns,
        "shutting down"
    );
    Ok(())
}

/// Print the tool catalog.
pub fn cmd_tools() -> Result<()> {
    let catalog = builtin_registry().catalog();

    println!();
    println!("  Tools ({})", catalog.len());
    println!();
    for spec in catalog.iter() {
        let schema = serde_json::to_string_pretty(&spec.input_schema)
            .context("failed to render input schema")?;
        println!("  {}", spec.name);
        println!("    {}", spec.description);
        for line in schema.lines() {
            println!("    {line}");
        }
        println!();
    }

    Ok(())
}
