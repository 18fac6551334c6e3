//! LLM router — manages named providers and assembles streamed tool calls.
//!
//! The router is the primary entry point for the rest of the engine when
//! it needs an LLM response. [`LlmRouter::chat_complete`] streams
//! [`StreamChunk`]s from the active provider, feeds tool-call deltas into
//! a fresh [`ToolCallAssembler`], and produces one [`AssembledAssistant`]
//! for persistence.
//!
//! If the assembler records any errors (malformed JSON from the model),
//! the final turn carries an *empty* `tool_calls` list and the errors in
//! `assembler_errors` — the orchestrator treats that as a protocol error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::assembler::ToolCallAssembler;
use crate::error::{LlmError, LlmResult};
use crate::provider::{ChunkStream, Provider};
use crate::types::{AssembledAssistant, Message, ToolCall};

/// Routes chat requests to a named provider and assembles the response.
#[derive(Default)]
pub struct LlmRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    active: Option<String>,
}

impl LlmRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Provider management
    // ------------------------------------------------------------------

    /// Register a provider under `name`. Overwrites any existing entry.
    /// The first registered provider becomes active.
    pub fn register_provider(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        let name = name.into();
        self.providers.insert(name.clone(), provider);
        if self.active.is_none() {
            self.active = Some(name);
        }
    }

    /// Switch the active provider.
    ///
    /// Must not be called while a `chat_complete` is in flight; the active
    /// provider is snapshotted at `chat_complete` entry.
    pub fn set_active(&mut self, name: &str) -> LlmResult<()> {
        if !self.providers.contains_key(name) {
            return Err(LlmError::UnknownProvider { name: name.into() });
        }
        self.active = Some(name.to_owned());
        Ok(())
    }

    /// Name of the currently active provider.
    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The active provider instance.
    pub fn active_provider(&self) -> LlmResult<Arc<dyn Provider>> {
        self.active
            .as_ref()
            .and_then(|name| self.providers.get(name))
            .cloned()
            .ok_or(LlmError::NoActiveProvider)
    }

    /// All registered provider names.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    // ------------------------------------------------------------------
    // Streaming chat
    // ------------------------------------------------------------------

    /// Stream chunks from the active provider without assembling them.
    pub async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[Value]>,
        timeout: Duration,
    ) -> LlmResult<ChunkStream> {
        self.active_provider()?.chat(messages, tools, timeout).await
    }

    /// Consume the full stream and return an [`AssembledAssistant`].
    ///
    /// This is the convenience method most callers should use. It drives
    /// the assembler and handles error bookkeeping.
    pub async fn chat_complete(
        &self,
        messages: &[Message],
        tools: Option<&[Value]>,
        timeout: Duration,
    ) -> LlmResult<AssembledAssistant> {
        // Snapshot at entry: a concurrent set_active cannot affect this turn.
        let provider = self.active_provider()?;
        let provider_name = self.active.clone();

        let mut stream = provider.chat(messages, tools, timeout).await?;
        let mut assembler = ToolCallAssembler::new();
        let mut content = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;

            if !chunk.delta.is_empty() {
                content.push_str(&chunk.delta);
            }

            for delta in &chunk.tool_deltas {
                if let Some(call) = assembler.feed(delta) {
                    tool_calls.push(call);
                }
            }
        }

        // Flush any remaining incomplete buffers.
        tool_calls.extend(assembler.flush());

        let assembler_errors = assembler.errors().to_vec();
        if !assembler_errors.is_empty() {
            warn!(errors = ?assembler_errors, "tool-call assembly errors; discarding calls");
            tool_calls.clear();
        }

        debug!(
            provider = provider_name.as_deref().unwrap_or(""),
            content_len = content.len(),
            tool_calls = tool_calls.len(),
            "assistant turn assembled"
        );

        Ok(AssembledAssistant {
            content,
            tool_calls,
            model: None,
            provider: provider_name,
            assembler_errors,
        })
    }

    // ------------------------------------------------------------------
    // Token counting
    // ------------------------------------------------------------------

    /// Delegate token counting to the active provider.
    pub fn count_tokens(&self, messages: &[Message], tools: Option<&[Value]>) -> LlmResult<usize> {
        Ok(self.active_provider()?.count_tokens(messages, tools))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
