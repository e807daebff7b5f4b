//! Integration tests for the palaver-agent crate.
//!
//! A scripted inference client and in-memory human I/O drive full chat
//! sessions without a network connection.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use palaver_agent::{
    AgentConfig, AgentError, ChatDisplay, ChatSession, ContentItem, ConversationHistory,
    Dispatcher, EventStream, HumanInput, InferenceClient, Response, ResponseBlock, ResponseMode,
    Result, SessionState, Speaker, StreamEvent, Tool, ToolCatalog, ToolError, ToolInvocation,
    ToolOutcome, ToolRegistry, ToolResult,
};
use serde::Deserialize;
use serde_json::{Value, json};

// ═══════════════════════════════════════════════════════════════════════
//  Test doubles
// ═══════════════════════════════════════════════════════════════════════

enum Step {
    Reply(Vec<Value>),
    Stream(Vec<StreamEvent>),
    Fail(AgentError),
}

/// Plays back a fixed script and records the history seen on every call.
struct ScriptedClient {
    steps: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<ConversationHistory>>,
}

impl ScriptedClient {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn next(&self, history: &ConversationHistory) -> Step {
        self.seen.lock().unwrap().push(history.clone());
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("client called more times than scripted")
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    async fn invoke_blocking(
        &self,
        history: &ConversationHistory,
        _catalog: &ToolCatalog,
        _model: &str,
    ) -> Result<Response> {
        match self.next(history) {
            Step::Reply(blocks) => Ok(Response {
                role: "assistant".into(),
                blocks: blocks.into_iter().map(ResponseBlock::from_json).collect(),
            }),
            Step::Fail(e) => Err(e),
            Step::Stream(_) => panic!("scripted a stream for a blocking call"),
        }
    }

    async fn invoke_streaming(
        &self,
        history: &ConversationHistory,
        _catalog: &ToolCatalog,
        _model: &str,
    ) -> Result<EventStream> {
        match self.next(history) {
            Step::Stream(events) => Ok(Box::pin(futures::stream::iter(
                events.into_iter().map(Ok),
            ))),
            Step::Fail(e) => Err(e),
            Step::Reply(_) => panic!("scripted a reply for a streaming call"),
        }
    }
}

struct ScriptedInput(VecDeque<String>);

impl ScriptedInput {
    fn new(lines: &[&str]) -> Self {
        Self(lines.iter().map(|s| s.to_string()).collect())
    }
}

#[async_trait]
impl HumanInput for ScriptedInput {
    async fn read_line(&mut self) -> Result<Option<String>> {
        Ok(self.0.pop_front())
    }
}

#[derive(Default)]
struct RecordingDisplay {
    events: Vec<String>,
}

impl ChatDisplay for RecordingDisplay {
    fn prompt(&mut self) {
        self.events.push("prompt".into());
    }

    fn model_text(&mut self, text: &str) {
        self.events.push(format!("text:{text}"));
    }

    fn model_fragment(&mut self, fragment: &str) {
        self.events.push(format!("fragment:{fragment}"));
    }

    fn end_model_stream(&mut self) {
        self.events.push("end".into());
    }

    fn tool_activity(&mut self, invocation: &ToolInvocation) {
        self.events
            .push(format!("tool:{}:{}", invocation.name, invocation.id));
    }

    fn tool_result(&mut self, result: &ToolResult) {
        let status = if result.is_error() { "err" } else { "ok" };
        self.events
            .push(format!("result:{}:{status}", result.invocation_id));
    }

    fn unrecognized(&mut self, kind: &str) {
        self.events.push(format!("unrecognized:{kind}"));
    }
}

#[derive(Deserialize)]
struct TimeInput {
    timezone: String,
}

/// Clock double that records the zones it was asked about.
#[derive(Clone, Default)]
struct FixedClock {
    asked: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Tool for FixedClock {
    type Input = TimeInput;
    type Output = String;

    fn name(&self) -> &str {
        "get_local_time"
    }

    fn description(&self) -> &str {
        "Current time in an IANA timezone"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"timezone": {"type": "string"}},
            "required": ["timezone"]
        })
    }

    async fn call(&self, input: TimeInput) -> std::result::Result<String, ToolError> {
        self.asked.lock().unwrap().push(input.timezone.clone());
        Ok(format!("2024-06-10T15:04:05+08:00 ({})", input.timezone))
    }
}

fn tool_use(id: &str, name: &str, input: Value) -> Value {
    json!({"type": "tool_use", "id": id, "name": name, "input": input})
}

fn text(t: &str) -> Value {
    json!({"type": "text", "text": t})
}

fn session(client: Arc<ScriptedClient>, clock: FixedClock, mode: ResponseMode) -> ChatSession {
    let registry = ToolRegistry::new().with(clock);
    let config = AgentConfig {
        model: "test-model".into(),
        mode,
        ..AgentConfig::default()
    };
    ChatSession::new(client, Dispatcher::new(Arc::new(registry)), config)
}

// ═══════════════════════════════════════════════════════════════════════
//  Session lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn immediate_end_of_input_makes_no_calls() {
    let client = ScriptedClient::new(Vec::new());
    let mut chat = session(client.clone(), FixedClock::default(), ResponseMode::Blocking);
    let mut display = RecordingDisplay::default();

    let outcome = chat
        .run(&mut ScriptedInput::new(&[]), &mut display)
        .await
        .unwrap();

    assert_eq!(client.calls(), 0);
    assert_eq!(outcome.turns, 0);
    assert_eq!(outcome.tool_rounds, 0);
    assert_eq!(display.events, ["prompt"]);
    assert_eq!(chat.state(), SessionState::Closed);
}

#[tokio::test]
async fn plain_text_exchange() {
    let client = ScriptedClient::new(vec![
        Step::Reply(vec![text("Hi there.")]),
        Step::Reply(vec![text("Bye.")]),
    ]);
    let mut chat = session(client.clone(), FixedClock::default(), ResponseMode::Blocking);
    let mut display = RecordingDisplay::default();

    let outcome = chat
        .run(&mut ScriptedInput::new(&["hello", "", "bye"]), &mut display)
        .await
        .unwrap();

    assert_eq!(client.calls(), 2);
    assert_eq!(outcome.turns, 4);
    assert_eq!(
        display.events,
        [
            "prompt",
            "text:Hi there.",
            "prompt",
            "prompt",
            "text:Bye.",
            "prompt"
        ]
    );
}

#[tokio::test]
async fn only_end_of_input_closes_the_session() {
    let client = ScriptedClient::new(vec![
        Step::Reply(vec![text("Still here.")]),
        Step::Reply(vec![text("Got it.")]),
    ]);
    let mut chat = session(client.clone(), FixedClock::default(), ResponseMode::Blocking);
    let mut display = RecordingDisplay::default();

    let outcome = chat
        .run(&mut ScriptedInput::new(&["exit", "quit"]), &mut display)
        .await
        .unwrap();

    assert_eq!(client.calls(), 2);
    assert_eq!(outcome.turns, 4);

    let history = chat.history();
    assert_eq!(history.turns()[0].text(), "exit");
    assert_eq!(history.turns()[2].text(), "quit");
}

// ═══════════════════════════════════════════════════════════════════════
//  Tool rounds
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn tool_round_then_answer_returns_to_input() {
    let clock = FixedClock::default();
    let client = ScriptedClient::new(vec![
        Step::Reply(vec![tool_use(
            "tu_1",
            "get_local_time",
            json!({"timezone": "Asia/Singapore"}),
        )]),
        Step::Reply(vec![text("It is 15:04 in Singapore.")]),
    ]);
    let mut chat = session(client.clone(), clock.clone(), ResponseMode::Blocking);
    let mut display = RecordingDisplay::default();

    chat.run(
        &mut ScriptedInput::new(&["What time is it in Asia/Singapore?"]),
        &mut display,
    )
    .await
    .unwrap();

    assert_eq!(client.calls(), 2);
    assert_eq!(*clock.asked.lock().unwrap(), ["Asia/Singapore"]);

    let turns = chat.history().turns();
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[2].speaker, Speaker::Human);
    let result = turns[2].tool_result_items().next().unwrap();
    assert_eq!(result.invocation_id, "tu_1");
    assert!(!result.is_error());
    assert_eq!(turns[3].text(), "It is 15:04 in Singapore.");

    assert_eq!(
        display.events,
        [
            "prompt",
            "tool:get_local_time:tu_1",
            "result:tu_1:ok",
            "text:It is 15:04 in Singapore.",
            "prompt"
        ]
    );
}

#[tokio::test]
async fn missing_required_field_yields_failure_and_session_continues() {
    let client = ScriptedClient::new(vec![
        Step::Reply(vec![tool_use("tu_bad", "get_local_time", json!({}))]),
        Step::Reply(vec![text("Which timezone did you mean?")]),
    ]);
    let mut chat = session(client.clone(), FixedClock::default(), ResponseMode::Blocking);

    chat.run(
        &mut ScriptedInput::new(&["What time is it?"]),
        &mut RecordingDisplay::default(),
    )
    .await
    .unwrap();

    assert_eq!(client.calls(), 2);

    // The second call saw the failure result keyed to the requesting id.
    let seen = client.seen.lock().unwrap();
    let last = seen[1].last().unwrap();
    let result = last.tool_result_items().next().unwrap();
    assert_eq!(result.invocation_id, "tu_bad");
    match &result.outcome {
        ToolOutcome::Failure(msg) => assert!(msg.contains("timezone"), "{msg}"),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn every_request_gets_one_result_in_order() {
    let clock = FixedClock::default();
    let client = ScriptedClient::new(vec![
        Step::Reply(vec![
            text("Checking three places."),
            tool_use("a", "get_local_time", json!({"timezone": "Europe/Paris"})),
            tool_use("b", "launch_rocket", json!({})),
            tool_use("c", "get_local_time", json!({"timezone": "Asia/Tokyo"})),
        ]),
        Step::Reply(vec![text("Done.")]),
    ]);
    let mut chat = session(client.clone(), clock.clone(), ResponseMode::Blocking);

    chat.run(
        &mut ScriptedInput::new(&["times please"]),
        &mut RecordingDisplay::default(),
    )
    .await
    .unwrap();

    assert_eq!(*clock.asked.lock().unwrap(), ["Europe/Paris", "Asia/Tokyo"]);

    let turns = chat.history().turns();
    let requested: Vec<_> = turns[1].tool_invocations().map(|i| i.id.clone()).collect();
    let answered: Vec<_> = turns[2]
        .tool_result_items()
        .map(|r| r.invocation_id.clone())
        .collect();
    assert_eq!(requested, ["a", "b", "c"]);
    assert_eq!(answered, requested);
    assert_eq!(turns[2].content.len(), 3);

    let unknown = turns[2].tool_result_items().nth(1).unwrap();
    assert!(unknown.content_text().contains("unknown tool: launch_rocket"));
}

#[tokio::test]
async fn chained_tool_rounds_without_new_input() {
    let client = ScriptedClient::new(vec![
        Step::Reply(vec![tool_use(
            "t1",
            "get_local_time",
            json!({"timezone": "UTC"}),
        )]),
        Step::Reply(vec![tool_use(
            "t2",
            "get_local_time",
            json!({"timezone": "Asia/Singapore"}),
        )]),
        Step::Reply(vec![text("Both checked.")]),
    ]);
    let mut chat = session(client.clone(), FixedClock::default(), ResponseMode::Blocking);

    let outcome = chat
        .run(
            &mut ScriptedInput::new(&["compare"]),
            &mut RecordingDisplay::default(),
        )
        .await
        .unwrap();

    assert_eq!(client.calls(), 3);
    assert_eq!(outcome.tool_rounds, 2);
    assert_eq!(outcome.turns, 6);
}

#[tokio::test]
async fn history_only_grows_across_calls() {
    let client = ScriptedClient::new(vec![
        Step::Reply(vec![tool_use(
            "t1",
            "get_local_time",
            json!({"timezone": "UTC"}),
        )]),
        Step::Reply(vec![text("Noon.")]),
        Step::Reply(vec![text("You're welcome.")]),
    ]);
    let mut chat = session(client.clone(), FixedClock::default(), ResponseMode::Blocking);

    chat.run(
        &mut ScriptedInput::new(&["time?", "thanks"]),
        &mut RecordingDisplay::default(),
    )
    .await
    .unwrap();

    let seen = client.seen.lock().unwrap();
    let mut snapshots: Vec<&[palaver_agent::Turn]> = seen.iter().map(|h| h.turns()).collect();
    snapshots.push(chat.history().turns());

    for pair in snapshots.windows(2) {
        let (earlier, later) = (pair[0], pair[1]);
        assert!(later.len() > earlier.len());
        assert_eq!(&later[..earlier.len()], earlier);
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Unrecognized content
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn unrecognized_block_is_kept_and_reported() {
    let client = ScriptedClient::new(vec![Step::Reply(vec![
        text("Here you go."),
        json!({"type": "image", "source": {}}),
    ])]);
    let mut chat = session(client.clone(), FixedClock::default(), ResponseMode::Blocking);
    let mut display = RecordingDisplay::default();

    chat.run(&mut ScriptedInput::new(&["draw"]), &mut display)
        .await
        .unwrap();

    assert!(display.events.contains(&"unrecognized:image".to_string()));
    assert_eq!(
        chat.history().last().unwrap().content[1],
        ContentItem::Unrecognized {
            kind: "image".into()
        }
    );
}

// ═══════════════════════════════════════════════════════════════════════
//  Fatal errors
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn connection_error_ends_session_without_new_turns() {
    let client = ScriptedClient::new(vec![Step::Fail(AgentError::LlmRequestFailed {
        reason: "connection refused".into(),
    })]);
    let mut chat = session(client.clone(), FixedClock::default(), ResponseMode::Blocking);

    let err = chat
        .run(
            &mut ScriptedInput::new(&["hello", "never read"]),
            &mut RecordingDisplay::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::LlmRequestFailed { .. }));
    assert!(err.to_string().contains("connection refused"));
    assert_eq!(client.calls(), 1);
    assert_eq!(chat.history().len(), 1);
    assert_eq!(chat.history().turns()[0].speaker, Speaker::Human);
    assert_eq!(chat.state(), SessionState::Closed);
}

// ═══════════════════════════════════════════════════════════════════════
//  Streaming
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn streamed_fragments_are_displayed_as_they_arrive() {
    let client = ScriptedClient::new(vec![Step::Stream(vec![
        StreamEvent::TurnStart {
            role: "assistant".into(),
        },
        StreamEvent::ContentDelta { text: "Hel".into() },
        StreamEvent::Unknown {
            tag: "content_block_stop".into(),
        },
        StreamEvent::ContentDelta { text: "lo!".into() },
    ])]);
    let mut chat = session(client.clone(), FixedClock::default(), ResponseMode::Streaming);
    let mut display = RecordingDisplay::default();

    chat.run(&mut ScriptedInput::new(&["hi"]), &mut display)
        .await
        .unwrap();

    assert_eq!(
        display.events,
        ["prompt", "fragment:Hel", "fragment:lo!", "end", "prompt"]
    );
    let last = chat.history().last().unwrap();
    assert_eq!(last.speaker, Speaker::Model);
    assert_eq!(last.content, vec![ContentItem::Text("Hello!".into())]);
}

#[tokio::test]
async fn streaming_open_failure_is_fatal() {
    let client = ScriptedClient::new(vec![Step::Fail(AgentError::LlmStreamError {
        reason: "overloaded".into(),
    })]);
    let mut chat = session(client.clone(), FixedClock::default(), ResponseMode::Streaming);

    let err = chat
        .run(
            &mut ScriptedInput::new(&["hi"]),
            &mut RecordingDisplay::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::LlmStreamError { .. }));
    assert_eq!(chat.history().len(), 1);
}
