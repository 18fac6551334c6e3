//! OpenAI-compatible chat-completion provider.
//!
//! Works with any endpoint that speaks the `/v1/chat/completions` wire
//! protocol — OpenAI itself, Azure OpenAI, vLLM, LM Studio, LocalAI, etc.
//! Streaming uses Server-Sent Events: `data: {json}` lines terminated by
//! the `data: [DONE]` sentinel. Tool-call fragments arrive keyed by the
//! wire `index` field and are forwarded as [`RawToolDelta`]s for the
//! router's assembler.

use std::time::Duration;

use async_stream::stream;
use futures::StreamExt;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{LlmError, LlmResult};
use crate::provider::{ChunkStream, Provider};
use crate::token_counter::TokenCounter;
use crate::types::{Message, RawToolDelta, Role, StreamChunk};

/// Configuration for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    /// Base URL of the API, e.g. `"https://api.openai.com/v1"`.
    pub url: String,
    /// Model identifier sent in the `model` field.
    pub model: String,
    /// Bearer token. Empty for unauthenticated local endpoints.
    pub api_key: String,
    /// Automatic retries on transient errors (5xx, 429).
    pub max_retries: u32,
    /// Maximum context window size in tokens.
    pub max_context_tokens: usize,
    /// Maximum output tokens.
    pub max_output_tokens: usize,
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            url: "https://api.openai.com/v1".into(),
            model: "gpt-4o".into(),
            api_key: String::new(),
            max_retries: 2,
            max_context_tokens: 128_000,
            max_output_tokens: 4096,
        }
    }
}

/// Stream-capable provider for any OpenAI-API-compatible endpoint.
pub struct OpenAiCompatProvider {
    config: OpenAiCompatConfig,
    http: reqwest::Client,
    counter: TokenCounter,
}

impl OpenAiCompatProvider {
    /// Create a provider from the given configuration.
    pub fn new(config: OpenAiCompatConfig) -> LlmResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| LlmError::RequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            config,
            http,
            counter: TokenCounter::new(),
        })
    }

    // ------------------------------------------------------------------
    // Request building
    // ------------------------------------------------------------------

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    fn build_body(&self, messages: &[Message], tools: Option<&[Value]>) -> Value {
        let wire_messages: Vec<Value> = messages
            .iter()
            .map(|msg| {
                let mut m = json!({
                    "role": Self::role_str(msg.role),
                    "content": msg.content,
                });
                if !msg.tool_calls.is_empty() {
                    m["tool_calls"] = Value::Array(
                        msg.tool_calls
                            .iter()
                            .map(|tc| {
                                json!({
                                    "id": tc.id,
                                    "type": "function",
                                    "function": {
                                        "name": tc.name,
                                        "arguments": tc.arguments.to_string(),
                                    },
                                })
                            })
                            .collect(),
                    );
                }
                if let Some(id) = &msg.tool_call_id {
                    m["tool_call_id"] = json!(id);
                }
                m
            })
            .collect();

        let mut body = json!({
            "model": self.config.model,
            "messages": wire_messages,
            "stream": true,
        });

        if let Some(tools) = tools {
            if !tools.is_empty() {
                // The wire format wraps each schema as a function tool.
                body["tools"] = Value::Array(
                    tools
                        .iter()
                        .map(|t| json!({"type": "function", "function": t}))
                        .collect(),
                );
                body["tool_choice"] = json!("auto");
            }
        }

        body
    }

    async fn send_request(
        &self,
        body: &Value,
        timeout: Duration,
    ) -> LlmResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.config.url.trim_end_matches('/'));

        let mut last_error: Option<LlmError> = None;
        for attempt in 0..=self.config.max_retries {
            let mut request = self
                .http
                .post(&url)
                .timeout(timeout)
                .header("Accept", "text/event-stream")
                .json(body);
            if !self.config.api_key.is_empty() {
                request = request.bearer_auth(&self.config.api_key);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_error = Some(LlmError::RequestFailed {
                            reason: format!("API returned {status}"),
                        });
                        debug!(%status, attempt, "retryable provider error");
                        continue;
                    }
                    if !status.is_success() {
                        let text = response.text().await.unwrap_or_default();
                        return Err(LlmError::RequestFailed {
                            reason: format!("API returned {status}: {text}"),
                        });
                    }
                    return Ok(response);
                }
                Err(e) => {
                    last_error = Some(e.into());
                    if attempt < self.config.max_retries {
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(LlmError::RequestFailed {
            reason: "request failed".into(),
        }))
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai-compat"
    }

    fn max_context_tokens(&self) -> usize {
        self.config.max_context_tokens
    }

    fn max_output_tokens(&self) -> usize {
        self.config.max_output_tokens
    }

    fn count_tokens(&self, messages: &[Message], tools: Option<&[Value]>) -> usize {
        self.counter.count_messages(messages, tools)
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[Value]>,
        timeout: Duration,
    ) -> LlmResult<ChunkStream> {
        let body = self.build_body(messages, tools);
        let response = self.send_request(&body, timeout).await?;

        let stream = stream! {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();
            let mut done_emitted = false;

            while let Some(chunk) = byte_stream.next().await {
                let bytes = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        yield Err(LlmError::StreamError {
                            reason: format!("stream read error: {e}"),
                        });
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                for data in drain_data_lines(&mut buffer) {
                    match parse_data_payload(&data) {
                        Ok(Some(chunk)) => {
                            if chunk.done {
                                done_emitted = true;
                            }
                            yield Ok(chunk);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }

            if !done_emitted {
                yield Ok(StreamChunk::finished());
            }
        };

        Ok(Box::pin(stream))
    }
}

// ---------------------------------------------------------------------------
// SSE decoding
// ---------------------------------------------------------------------------

/// Extract complete `data:` payloads from an SSE buffer.
///
/// Events are delimited by `\n\n`; only `data:` lines matter here. The
/// buffer is drained in place so a trailing partial event survives until
/// the next call.
fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut payloads = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2);

        for line in block.lines() {
            if let Some(data) = line.trim().strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    payloads.push(data.to_owned());
                }
            }
        }
    }

    payloads
}

/// Parse one `data:` payload into a [`StreamChunk`].
///
/// Returns `Ok(None)` for payloads with nothing of interest (keepalives,
/// role-only deltas).
fn parse_data_payload(data: &str) -> LlmResult<Option<StreamChunk>> {
    if data == "[DONE]" {
        return Ok(Some(StreamChunk::finished()));
    }

    let value: Value = serde_json::from_str(data).map_err(|e| LlmError::ParseFailed {
        reason: format!("invalid JSON in SSE data: {e}"),
    })?;

    let Some(choice) = value["choices"].get(0) else {
        return Ok(None);
    };

    let mut chunk = StreamChunk::default();

    let delta = &choice["delta"];
    if let Some(text) = delta["content"].as_str() {
        chunk.delta.push_str(text);
    }

    if let Some(tool_calls) = delta["tool_calls"].as_array() {
        for tc in tool_calls {
            let call_index = tc["index"].as_u64().unwrap_or(0) as u32;
            chunk.tool_deltas.push(RawToolDelta {
                call_index,
                id: tc["id"].as_str().map(String::from),
                name_delta: tc["function"]["name"].as_str().unwrap_or("").to_owned(),
                args_delta: tc["function"]["arguments"]
                    .as_str()
                    .unwrap_or("")
                    .to_owned(),
                done: false,
            });
        }
    }

    if choice["finish_reason"].as_str().is_some() {
        chunk.done = true;
    }

    if chunk.delta.is_empty() && chunk.tool_deltas.is_empty() && !chunk.done {
        return Ok(None);
    }
    Ok(Some(chunk))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
