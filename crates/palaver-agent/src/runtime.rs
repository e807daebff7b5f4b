//! Chat session runtime.
//!
//! A [`ChatSession`] owns one conversation and drives it:
//!
//! 1. Read a line of human input and append it as a human turn.
//! 2. Ask the model for its next turn (blocking or streaming, fixed for the
//!    session), normalize it, append it, and show its text.
//! 3. Run every tool the model asked for, one after another in the order it
//!    asked, and append the results as a single human-attributed turn.
//! 4. If there were results, go back to 2 without reading input; otherwise
//!    go back to 1.
//!
//! End of input closes the session cleanly.  Any error from the inference
//! client ends it with that error.

use std::sync::Arc;

use uuid::Uuid;

use crate::conversation::{ContentItem, ConversationHistory, ToolInvocation, Turn};
use crate::error::{AgentError, Result};
use crate::io::{ChatDisplay, HumanInput};
use crate::llm::InferenceClient;
use crate::normalize::{normalize_response, normalize_stream};
use crate::tools::{Dispatcher, ToolCatalog};

/// Default bound on consecutive tool rounds between two human inputs.
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 20;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How the model's turn is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    /// One request, one complete response.
    #[default]
    Blocking,
    /// Incremental fragments rendered as they arrive.  Tool invocations are
    /// not recognized in this mode.
    Streaming,
}

impl std::fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blocking => write!(f, "blocking"),
            Self::Streaming => write!(f, "streaming"),
        }
    }
}

/// Configuration for a chat session.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model identifier; empty means the client's default model.
    pub model: String,

    /// Response mode for every inference call in the session.
    pub mode: ResponseMode,

    /// Maximum tool-result follow-ups after a single human input.
    /// `None` removes the bound.
    pub max_tool_rounds: Option<u32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            mode: ResponseMode::Blocking,
            max_tool_rounds: Some(DEFAULT_MAX_TOOL_ROUNDS),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Where the session is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the next human line.
    AwaitingHumanInput,
    /// Tool results were appended; the model is asked again without new input.
    AwaitingToolResults,
    /// Terminal.
    Closed,
}

/// Summary returned when a session ends cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    /// Turns in the history at close.
    pub turns: usize,
    /// Tool rounds run over the whole session.
    pub tool_rounds: u32,
}

/// A single conversation between one human and one model.
pub struct ChatSession {
    session_id: Uuid,
    client: Arc<dyn InferenceClient>,
    dispatcher: Dispatcher,
    catalog: ToolCatalog,
    config: AgentConfig,
    history: ConversationHistory,
    state: SessionState,
    tool_rounds: u32,
}

impl ChatSession {
    /// Create a session.  The tool catalog is captured from the dispatcher
    /// once and advertised unchanged on every call.
    pub fn new(
        client: Arc<dyn InferenceClient>,
        dispatcher: Dispatcher,
        config: AgentConfig,
    ) -> Self {
        let catalog = dispatcher.catalog();
        Self {
            session_id: Uuid::now_v7(),
            client,
            dispatcher,
            catalog,
            config,
            history: ConversationHistory::new(),
            state: SessionState::AwaitingHumanInput,
            tool_rounds: 0,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run the session until input ends or a fatal error occurs.
    ///
    /// # Errors
    ///
    /// Any inference failure, an input read failure, or
    /// [`AgentError::ToolRoundLimitExceeded`].  The session is closed either
    /// way.
    pub async fn run(
        &mut self,
        input: &mut dyn HumanInput,
        display: &mut dyn ChatDisplay,
    ) -> Result<SessionOutcome> {
        tracing::info!(
            session_id = %self.session_id,
            model = %self.config.model,
            mode = %self.config.mode,
            tool_count = self.catalog.len(),
            "chat session started"
        );

        let result = self.drive(input, display).await;
        self.state = SessionState::Closed;

        match &result {
            Ok(outcome) => tracing::info!(
                session_id = %self.session_id,
                turns = outcome.turns,
                tool_rounds = outcome.tool_rounds,
                "chat session closed"
            ),
            Err(e) => tracing::error!(
                session_id = %self.session_id,
                error = %e,
                "chat session aborted"
            ),
        }

        result
    }

    async fn drive(
        &mut self,
        input: &mut dyn HumanInput,
        display: &mut dyn ChatDisplay,
    ) -> Result<SessionOutcome> {
        loop {
            self.state = SessionState::AwaitingHumanInput;
            display.prompt();

            let Some(line) = input.read_line().await? else {
                tracing::debug!(session_id = %self.session_id, "end of input");
                break;
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            self.history.push(Turn::human_text(line));
            self.respond(display).await?;
        }

        Ok(SessionOutcome {
            session_id: self.session_id,
            turns: self.history.len(),
            tool_rounds: self.tool_rounds,
        })
    }

    /// Infer, dispatch and repeat until the model stops asking for tools.
    async fn respond(&mut self, display: &mut dyn ChatDisplay) -> Result<()> {
        let mut rounds: u32 = 0;

        loop {
            let turn = self.infer(display).await?;
            let invocations: Vec<ToolInvocation> = turn.tool_invocations().cloned().collect();

            tracing::info!(
                session_id = %self.session_id,
                turn = self.history.len(),
                speaker = %turn.speaker,
                items = turn.content.len(),
                tool_count = invocations.len(),
                "model turn received"
            );
            self.history.push(turn);

            if invocations.is_empty() {
                return Ok(());
            }

            let mut results = Vec::with_capacity(invocations.len());
            for invocation in invocations {
                display.tool_activity(&invocation);
                let result = self
                    .dispatcher
                    .dispatch(&invocation.name, &invocation.id, invocation.input)
                    .await;
                display.tool_result(&result);
                results.push(result);
            }

            self.history.push(Turn::tool_results(results));
            self.state = SessionState::AwaitingToolResults;
            self.tool_rounds += 1;
            rounds += 1;

            if let Some(max_rounds) = self.config.max_tool_rounds
                && rounds > max_rounds
            {
                return Err(AgentError::ToolRoundLimitExceeded {
                    session_id: self.session_id,
                    max_rounds,
                });
            }

            tracing::debug!(session_id = %self.session_id, rounds, "sending tool results");
        }
    }

    /// Ask the model for its next turn in the configured mode.
    async fn infer(&self, display: &mut dyn ChatDisplay) -> Result<Turn> {
        let model = self.config.model.as_str();

        match self.config.mode {
            ResponseMode::Blocking => {
                let response = self
                    .client
                    .invoke_blocking(&self.history, &self.catalog, model)
                    .await?;
                let turn = normalize_response(response);

                for item in &turn.content {
                    match item {
                        ContentItem::Text(text) if !text.is_empty() => display.model_text(text),
                        ContentItem::Unrecognized { kind } => display.unrecognized(kind),
                        _ => {}
                    }
                }
                Ok(turn)
            }
            ResponseMode::Streaming => {
                let events = self
                    .client
                    .invoke_streaming(&self.history, &self.catalog, model)
                    .await?;
                let turn = normalize_stream(events, |fragment| display.model_fragment(fragment)).await;
                display.end_model_stream();
                turn
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
