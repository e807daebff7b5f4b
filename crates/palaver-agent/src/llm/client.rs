//! Multi-provider LLM client.
//!
//! Supports the **Anthropic Messages API** and the **OpenAI Chat Completions
//! API** (including OpenAI-compatible endpoints such as Ollama, Together, and
//! vLLM) with both streaming SSE and non-streaming modes.
//!
//! Whatever the provider, a blocking call comes back as a [`Response`] whose
//! blocks use the Anthropic-style `text` / `tool_use` tags, and a streaming
//! call comes back as an [`EventStream`] of provider-neutral
//! [`StreamEvent`]s.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::conversation::{ContentItem, ConversationHistory, Speaker};
use crate::error::{AgentError, Result};
use crate::llm::streaming::SseParser;
use crate::llm::streaming_openai::OpenAiChunkParser;
use crate::llm::types::{Response, ResponseBlock, StreamEvent};
use crate::llm::{EventStream, InferenceClient};
use crate::tools::ToolCatalog;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default Anthropic API base URL.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default maximum tokens per response.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Upper bound on establishing a connection.  Reading the response has no
/// deadline; a long stream is allowed to take as long as it takes.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Provider enum
// ---------------------------------------------------------------------------

/// Identifies which LLM provider the client should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Anthropic Messages API.
    #[default]
    Anthropic,
    /// OpenAI Chat Completions API (also covers OpenAI-compatible endpoints).
    #[serde(alias = "openai-compatible")]
    OpenAI,
}

impl LlmProvider {
    /// Environment variable holding the API key for this provider.
    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAI => "OPENAI_API_KEY",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAI => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" | "openai-compatible" => Ok(Self::OpenAI),
            other => Err(AgentError::ConfigError {
                reason: format!("unknown provider `{other}` (expected anthropic or openai)"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Configuration for connecting to a single LLM provider endpoint.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    /// Which provider this configuration targets.
    pub provider: LlmProvider,
    /// API key for authentication.
    pub api_key: String,
    /// Base URL for the API (e.g. `https://api.anthropic.com`).
    pub base_url: String,
    /// Model used when a call passes an empty model id.
    pub default_model: String,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Sampling temperature; provider default when `None`.
    pub temperature: Option<f32>,
    /// System prompt sent with every request.
    pub system_prompt: Option<String>,
}

impl LlmClientConfig {
    /// Create a configuration for the Anthropic Claude API.
    pub fn anthropic(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            api_key: api_key.into(),
            base_url: ANTHROPIC_BASE_URL.to_owned(),
            default_model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            system_prompt: None,
        }
    }

    /// Create a configuration for the OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_owned(),
            default_model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            system_prompt: None,
        }
    }

    /// Create a configuration for any OpenAI-compatible API (e.g. Ollama,
    /// Together, vLLM).
    pub fn openai_compatible(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::openai(api_key, model)
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// An LLM client that communicates with either the Anthropic Messages API or
/// the OpenAI Chat Completions API.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: Arc<LlmClientConfig>,
    http: reqwest::Client,
}

impl LlmClient {
    /// Create a new client with the given configuration.
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AgentError::MissingApiKey {
                provider: config.provider.to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    /// The provider this client targets.
    pub fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    /// The configuration the client was built with.
    pub fn config(&self) -> &LlmClientConfig {
        &self.config
    }

    fn resolve_model<'a>(&'a self, model: &'a str) -> &'a str {
        if model.is_empty() {
            self.config.default_model.as_str()
        } else {
            model
        }
    }

    /// Build the request body for the configured provider.
    fn build_request_body(
        &self,
        history: &ConversationHistory,
        catalog: &ToolCatalog,
        model: &str,
        stream: bool,
    ) -> Value {
        match self.config.provider {
            LlmProvider::Anthropic => {
                self.build_anthropic_request_body(history, catalog, model, stream)
            }
            LlmProvider::OpenAI => self.build_openai_request_body(history, catalog, model, stream),
        }
    }

    /// POST `body` to the provider's endpoint and fail on non-2xx statuses.
    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let (url, headers) = match self.config.provider {
            LlmProvider::Anthropic => (
                format!("{}/v1/messages", self.config.base_url),
                self.anthropic_headers()?,
            ),
            LlmProvider::OpenAI => (
                format!("{}/chat/completions", self.config.base_url),
                self.openai_headers()?,
            ),
        };

        tracing::debug!(
            url = %url,
            model = %body["model"],
            provider = %self.config.provider,
            stream = body.get("stream").is_some(),
            "sending LLM request"
        );

        let resp = self
            .http
            .post(&url)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AgentError::LlmRequestFailed {
                reason: format!("API returned {status}: {text}"),
            });
        }

        Ok(resp)
    }

    // =======================================================================
    // Anthropic
    // =======================================================================

    /// Build the JSON body for the Anthropic Messages API.
    fn build_anthropic_request_body(
        &self,
        history: &ConversationHistory,
        catalog: &ToolCatalog,
        model: &str,
        stream: bool,
    ) -> Value {
        let mut body = json!({
            "model": self.resolve_model(model),
            "max_tokens": self.config.max_tokens,
            "messages": turns_to_anthropic(history),
        });

        if let Some(system) = &self.config.system_prompt {
            body["system"] = json!(system);
        }

        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }

        if !catalog.is_empty() {
            body["tools"] = catalog_to_anthropic(catalog);
        }

        if stream {
            body["stream"] = json!(true);
        }

        body
    }

    fn anthropic_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.config.api_key).map_err(|e| {
                AgentError::LlmRequestFailed {
                    reason: format!("invalid API key header: {e}"),
                }
            })?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    // =======================================================================
    // OpenAI
    // =======================================================================

    /// Build the JSON body for the OpenAI Chat Completions API.
    fn build_openai_request_body(
        &self,
        history: &ConversationHistory,
        catalog: &ToolCatalog,
        model: &str,
        stream: bool,
    ) -> Value {
        let mut body = json!({
            "model": self.resolve_model(model),
            "max_tokens": self.config.max_tokens,
            "messages": turns_to_openai(history, self.config.system_prompt.as_deref()),
        });

        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }

        if !catalog.is_empty() {
            body["tools"] = catalog_to_openai(catalog);
        }

        if stream {
            body["stream"] = json!(true);
        }

        body
    }

    fn openai_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", self.config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("invalid authorization header: {e}"),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl InferenceClient for LlmClient {
    async fn invoke_blocking(
        &self,
        history: &ConversationHistory,
        catalog: &ToolCatalog,
        model: &str,
    ) -> Result<Response> {
        let body = self.build_request_body(history, catalog, model, false);
        let resp = self.send(&body).await?;

        let text = resp
            .text()
            .await
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to read response body: {e}"),
            })?;

        let v: Value = serde_json::from_str(&text).map_err(|e| AgentError::LlmParseFailed {
            reason: format!("invalid JSON response: {e}"),
        })?;

        match self.config.provider {
            LlmProvider::Anthropic => parse_anthropic_response(&v),
            LlmProvider::OpenAI => parse_openai_response(&v),
        }
    }

    async fn invoke_streaming(
        &self,
        history: &ConversationHistory,
        catalog: &ToolCatalog,
        model: &str,
    ) -> Result<EventStream> {
        let body = self.build_request_body(history, catalog, model, true);
        let resp = self.send(&body).await?;
        Ok(sse_event_stream(resp.bytes_stream(), self.config.provider))
    }
}

// ===========================================================================
// SSE plumbing
// ===========================================================================

/// Per-provider line decoder.
enum LineDecoder {
    Anthropic(SseParser),
    OpenAI(OpenAiChunkParser),
}

impl LineDecoder {
    fn for_provider(provider: LlmProvider) -> Self {
        match provider {
            LlmProvider::Anthropic => Self::Anthropic(SseParser::new()),
            LlmProvider::OpenAI => Self::OpenAI(OpenAiChunkParser::new()),
        }
    }

    fn feed_line(&mut self, line: &str) -> Result<Vec<StreamEvent>> {
        match self {
            Self::Anthropic(parser) => Ok(parser.parse_line(line)?.into_iter().collect()),
            Self::OpenAI(parser) => parser.feed_line(line),
        }
    }

    fn is_done(&self) -> bool {
        match self {
            Self::Anthropic(parser) => parser.is_done(),
            Self::OpenAI(parser) => parser.is_done(),
        }
    }
}

/// Turn an SSE response body into an [`EventStream`].
///
/// Bytes are buffered until a full line is available so multi-byte UTF-8
/// sequences split across network chunks decode correctly.  The stream ends
/// at the provider's terminator, at the first error, or when the body ends.
fn sse_event_stream<S, B, E>(body: S, provider: LlmProvider) -> EventStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let events = async_stream::stream! {
        let mut decoder = LineDecoder::for_provider(provider);
        let mut byte_stream = std::pin::pin!(body);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(AgentError::LlmStreamError {
                        reason: format!("stream read error: {e}"),
                    });
                    return;
                }
            };
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
                match decode_line(&mut decoder, &line) {
                    Ok(decoded) => {
                        for event in decoded {
                            yield Ok(event);
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
                if decoder.is_done() {
                    return;
                }
            }
        }

        if !buffer.is_empty() {
            match decode_line(&mut decoder, &buffer) {
                Ok(decoded) => {
                    for event in decoded {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        if !decoder.is_done() {
            tracing::warn!(provider = %provider, "stream closed without a terminator");
        }
    };

    Box::pin(events)
}

fn decode_line(decoder: &mut LineDecoder, raw: &[u8]) -> Result<Vec<StreamEvent>> {
    let line = std::str::from_utf8(raw).map_err(|e| AgentError::LlmStreamError {
        reason: format!("invalid UTF-8 in stream: {e}"),
    })?;
    decoder.feed_line(line)
}

// ===========================================================================
// Anthropic format conversion (free functions)
// ===========================================================================

/// Convert the history to the Anthropic `messages` array.
///
/// Tool results ride in `user` messages as `tool_result` blocks.  Empty text
/// and unrecognized items are not sent; a turn left with no blocks is
/// dropped from the request.
pub fn turns_to_anthropic(history: &ConversationHistory) -> Vec<Value> {
    let mut wire_messages: Vec<Value> = Vec::with_capacity(history.len());

    for turn in history.turns() {
        let role = match turn.speaker {
            Speaker::Human => "user",
            Speaker::Model => "assistant",
        };

        let mut content: Vec<Value> = Vec::with_capacity(turn.content.len());
        for item in &turn.content {
            match item {
                ContentItem::Text(text) => {
                    if !text.is_empty() {
                        content.push(json!({ "type": "text", "text": text }));
                    }
                }
                ContentItem::ToolInvocation(inv) => {
                    content.push(json!({
                        "type": "tool_use",
                        "id": inv.id,
                        "name": inv.name,
                        "input": inv.input,
                    }));
                }
                ContentItem::ToolResult(result) => {
                    let mut block = json!({
                        "type": "tool_result",
                        "tool_use_id": result.invocation_id,
                        "content": result.content_text(),
                    });
                    if result.is_error() {
                        block["is_error"] = json!(true);
                    }
                    content.push(block);
                }
                ContentItem::Unrecognized { kind } => {
                    tracing::debug!(kind = %kind, "not sending unrecognized content item");
                }
            }
        }

        if content.is_empty() {
            tracing::debug!(role, "skipping turn with no sendable content");
            continue;
        }

        wire_messages.push(json!({ "role": role, "content": content }));
    }

    wire_messages
}

/// Convert the tool catalog into the Anthropic API format.
pub fn catalog_to_anthropic(catalog: &ToolCatalog) -> Value {
    let tool_values: Vec<Value> = catalog
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.input_schema,
            })
        })
        .collect();
    json!(tool_values)
}

/// Parse a non-streaming Anthropic Messages API response.
pub fn parse_anthropic_response(v: &Value) -> Result<Response> {
    let content = v["content"]
        .as_array()
        .ok_or_else(|| AgentError::LlmParseFailed {
            reason: "missing `content` array in response".into(),
        })?;

    Ok(Response {
        role: v["role"].as_str().unwrap_or("assistant").to_owned(),
        blocks: content.iter().cloned().map(ResponseBlock::from_json).collect(),
    })
}

// ===========================================================================
// OpenAI format conversion (free functions)
// ===========================================================================

/// Convert the history to the OpenAI Chat Completions wire format.
///
/// In the OpenAI format the system prompt is the first message, tool calls
/// live in `assistant.tool_calls`, and each tool result is its own
/// `role: "tool"` message.
pub fn turns_to_openai(history: &ConversationHistory, system: Option<&str>) -> Vec<Value> {
    let mut wire_messages: Vec<Value> = Vec::with_capacity(history.len() + 1);

    if let Some(system) = system {
        wire_messages.push(json!({ "role": "system", "content": system }));
    }

    for turn in history.turns() {
        let text = turn.text();

        match turn.speaker {
            Speaker::Human => {
                if !text.is_empty() {
                    wire_messages.push(json!({ "role": "user", "content": text }));
                }
                for result in turn.tool_result_items() {
                    wire_messages.push(json!({
                        "role": "tool",
                        "tool_call_id": result.invocation_id,
                        "content": result.content_text(),
                    }));
                }
            }
            Speaker::Model => {
                let tool_calls: Vec<Value> = turn
                    .tool_invocations()
                    .map(|inv| {
                        json!({
                            "id": inv.id,
                            "type": "function",
                            "function": {
                                "name": inv.name,
                                "arguments": inv.input.to_string(),
                            }
                        })
                    })
                    .collect();

                let mut m = json!({ "role": "assistant", "content": text });
                if !tool_calls.is_empty() {
                    if text.is_empty() {
                        m["content"] = Value::Null;
                    }
                    m["tool_calls"] = json!(tool_calls);
                }
                wire_messages.push(m);
            }
        }
    }

    wire_messages
}

/// Convert the tool catalog into the OpenAI Chat Completions API format.
///
/// OpenAI wraps each tool in `{"type": "function", "function": {...}}`.
pub fn catalog_to_openai(catalog: &ToolCatalog) -> Value {
    let tool_values: Vec<Value> = catalog
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                }
            })
        })
        .collect();
    json!(tool_values)
}

/// Parse a non-streaming OpenAI Chat Completions response.
///
/// The message is reshaped into Anthropic-style blocks: the text content
/// becomes a `text` block and each tool call a `tool_use` block.  Tool-call
/// arguments that are not valid JSON are kept as a raw string so the
/// dispatcher reports the decode failure back to the model.
pub fn parse_openai_response(v: &Value) -> Result<Response> {
    let message = &v["choices"][0]["message"];

    if message.is_null() {
        return Err(AgentError::LlmParseFailed {
            reason: "missing `choices[0].message` in response".into(),
        });
    }

    let mut blocks = Vec::new();

    if let Some(content) = message["content"].as_str()
        && !content.is_empty()
    {
        blocks.push(ResponseBlock::from_json(
            json!({ "type": "text", "text": content }),
        ));
    }

    if let Some(refusal) = message["refusal"].as_str() {
        blocks.push(ResponseBlock::from_json(
            json!({ "type": "refusal", "refusal": refusal }),
        ));
    }

    if let Some(tool_calls) = message["tool_calls"].as_array() {
        for tc in tool_calls {
            let func = &tc["function"];
            let name = func["name"].as_str().unwrap_or_default();
            let raw_args = func["arguments"].as_str().unwrap_or("{}");
            let input = serde_json::from_str::<Value>(raw_args).unwrap_or_else(|e| {
                tracing::warn!(tool = name, error = %e, "tool call arguments are not valid JSON");
                Value::String(raw_args.to_owned())
            });

            blocks.push(ResponseBlock::from_json(json!({
                "type": "tool_use",
                "id": tc["id"],
                "name": name,
                "input": input,
            })));
        }
    }

    Ok(Response {
        role: message["role"].as_str().unwrap_or("assistant").to_owned(),
        blocks,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
