//! Ollama provider.
//!
//! Streams responses from a local Ollama instance via its `/api/chat`
//! endpoint. Unlike the OpenAI wire format this is newline-delimited
//! JSON: each line is one complete object, and tool calls arrive whole
//! (already-parsed arguments), so every tool delta is emitted finalized.

use std::time::Duration;

use async_stream::stream;
use futures::StreamExt;
use serde_json::{Value, json};
use tracing::warn;

use crate::error::{LlmError, LlmResult};
use crate::provider::{ChunkStream, Provider};
use crate::token_counter::TokenCounter;
use crate::types::{Message, RawToolDelta, Role, StreamChunk};

/// Ollama context sizes vary by model. Default to a reasonable value.
const DEFAULT_MAX_CONTEXT: usize = 8192;

/// Configuration for a local Ollama endpoint.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL of the Ollama HTTP API.
    pub url: String,
    /// Model tag, e.g. `"llama3"` or `"mistral"`.
    pub model: String,
    /// Maximum context window in tokens (model-dependent).
    pub max_context_tokens: usize,
    /// Maximum output tokens.
    pub max_output_tokens: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".into(),
            model: "llama3".into(),
            max_context_tokens: DEFAULT_MAX_CONTEXT,
            max_output_tokens: 4096,
        }
    }
}

/// Provider for a local [Ollama](https://ollama.com) instance.
pub struct OllamaProvider {
    config: OllamaConfig,
    http: reqwest::Client,
    counter: TokenCounter,
}

impl OllamaProvider {
    /// Create a provider from the given configuration.
    pub fn new(config: OllamaConfig) -> LlmResult<Self> {
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
                    // Ollama expects arguments as an object, not a string.
                    m["tool_calls"] = Value::Array(
                        msg.tool_calls
                            .iter()
                            .map(|tc| {
                                json!({
                                    "function": {
                                        "name": tc.name,
                                        "arguments": tc.arguments,
                                    },
                                })
                            })
                            .collect(),
                    );
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
                body["tools"] = Value::Array(
                    tools
                        .iter()
                        .map(|t| json!({"type": "function", "function": t}))
                        .collect(),
                );
            }
        }
        body
    }
}

#[async_trait::async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
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
        let url = format!("{}/api/chat", self.config.url.trim_end_matches('/'));

        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                reason: format!("Ollama returned {status}: {text}"),
            });
        }

        let stream = stream! {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();
            let mut done_emitted = false;

            while let Some(bytes) = byte_stream.next().await {
                let bytes = match bytes {
                    Ok(b) => b,
                    Err(e) => {
                        yield Err(LlmError::StreamError {
                            reason: format!("stream read error: {e}"),
                        });
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(pos) = buffer.find('\n') {
                    let line: String = buffer.drain(..=pos).collect();
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match parse_line(line) {
                        Some(chunk) => {
                            let finished = chunk.done;
                            if finished {
                                done_emitted = true;
                            }
                            yield Ok(chunk);
                            if finished {
                                return;
                            }
                        }
                        None => {
                            warn!(%line, "skipping unparseable line from ollama");
                        }
                    }
                }
            }

            // Flush a trailing partial line, then always end with done.
            let remaining = buffer.trim().to_owned();
            if !remaining.is_empty() {
                if let Some(chunk) = parse_line(&remaining) {
                    let finished = chunk.done;
                    if finished {
                        done_emitted = true;
                    }
                    yield Ok(chunk);
                }
            }
            if !done_emitted {
                yield Ok(StreamChunk::finished());
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Convert one NDJSON line to a [`StreamChunk`]. Returns `None` on
/// unparseable input (the stream skips the line).
fn parse_line(line: &str) -> Option<StreamChunk> {
    let data: Value = serde_json::from_str(line).ok()?;

    let message = &data["message"];
    let mut chunk = StreamChunk {
        delta: message["content"].as_str().unwrap_or("").to_owned(),
        done: data["done"].as_bool().unwrap_or(false),
        ..Default::default()
    };

    // Tool calls arrive complete, arguments already parsed; emit each as
    // a single finalized delta.
    if let Some(tool_calls) = message["tool_calls"].as_array() {
        for (idx, tc) in tool_calls.iter().enumerate() {
            let func = &tc["function"];
            chunk.tool_deltas.push(RawToolDelta {
                call_index: idx as u32,
                id: Some(format!("ollama_call_{idx}")),
                name_delta: func["name"].as_str().unwrap_or("").to_owned(),
                args_delta: func["arguments"].to_string(),
                done: true,
            });
        }
    }

    Some(chunk)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
