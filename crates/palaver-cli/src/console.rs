//! Terminal input and output for the chat session.

use std::io::{self, IsTerminal, Write};

use async_trait::async_trait;
use palaver_agent::{AgentError, ChatDisplay, HumanInput, ToolInvocation};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

const BLUE: &str = "\x1b[34m";
const GREEN: &str = "\x1b[32m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Line reader over standard input.
pub struct ConsoleInput {
    lines: Lines<BufReader<Stdin>>,
}

impl ConsoleInput {
    pub fn stdin() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

#[async_trait]
impl HumanInput for ConsoleInput {
    async fn read_line(&mut self) -> palaver_agent::Result<Option<String>> {
        self.lines
            .next_line()
            .await
            .map_err(|e| AgentError::InputFailed {
                reason: e.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Writes the transcript to a terminal (or any writer).
///
/// Write errors are ignored; a closed stdout should not end the session.
pub struct ConsoleDisplay<W: Write + Send> {
    out: W,
    color: bool,
    streaming: bool,
}

impl ConsoleDisplay<io::Stdout> {
    /// Display on stdout, colored when stdout is a terminal and `NO_COLOR`
    /// is unset.
    pub fn stdout() -> Self {
        let color = io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Self::new(io::stdout(), color)
    }
}

impl<W: Write + Send> ConsoleDisplay<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            streaming: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, code: &'static str, text: &str) -> String {
        if self.color {
            format!("{code}{text}{RESET}")
        } else {
            text.to_owned()
        }
    }

    fn model_label(&self) -> String {
        self.paint(GREEN, "Assistant:")
    }
}

impl<W: Write + Send> ChatDisplay for ConsoleDisplay<W> {
    fn prompt(&mut self) {
        let label = self.paint(BLUE, "You:");
        write!(self.out, "{label} ").ok();
        self.out.flush().ok();
    }

    fn model_text(&mut self, text: &str) {
        let label = self.model_label();
        writeln!(self.out, "{label} {text}").ok();
    }

    fn model_fragment(&mut self, fragment: &str) {
        if !self.streaming {
            self.streaming = true;
            let label = self.model_label();
            write!(self.out, "{label} ").ok();
        }
        write!(self.out, "{fragment}").ok();
        self.out.flush().ok();
    }

    fn end_model_stream(&mut self) {
        if self.streaming {
            self.streaming = false;
            writeln!(self.out).ok();
        }
    }

    fn tool_activity(&mut self, invocation: &ToolInvocation) {
        let notice = self.paint(
            DIM,
            &format!(
                "  [tool] {} (id {}) input: {}",
                invocation.name, invocation.id, invocation.input
            ),
        );
        writeln!(self.out, "{notice}").ok();
    }

    fn unrecognized(&mut self, kind: &str) {
        let notice = self.paint(DIM, &format!("  [skipped unsupported content: {kind}]"));
        writeln!(self.out, "{notice}").ok();
    }
}
