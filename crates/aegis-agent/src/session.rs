//! High-level session manager.
//!
//! Ties together the event store, artifact store and context packer to
//! give the orchestrator one coherent API: record events, derive the
//! LLM-visible [`Message`] list from the event history, and build a
//! token-budgeted context window.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use aegis_llm::{Message, TokenCounter, ToolCall};
use aegis_store::{ArtifactStore, EventPayload, SessionEvent, SessionStore};

use crate::context::{ContextPackReport, ContextPacker};
use crate::error::{AgentError, AgentResult};

/// Manages a single conversation session.
pub struct Session {
    store: Arc<SessionStore>,
    artifacts: Arc<ArtifactStore>,
    packer: ContextPacker,
    session_id: Option<String>,
    turn_id: Option<String>,
}

impl Session {
    /// Create a session manager over the given stores.
    pub fn new(
        store: Arc<SessionStore>,
        artifacts: Arc<ArtifactStore>,
        counter: TokenCounter,
    ) -> Self {
        Self {
            store,
            artifacts,
            packer: ContextPacker::new(counter),
            session_id: None,
            turn_id: None,
        }
    }

    /// The artifact store backing this session.
    pub fn artifact_store(&self) -> &Arc<ArtifactStore> {
        &self.artifacts
    }

    /// The event store backing this session.
    pub fn event_store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create a new session and return its id.
    pub async fn start(&mut self, metadata: Option<Value>) -> AgentResult<String> {
        let session_id = self.store.create_session(metadata).await?;
        debug!(session_id = %session_id, "session started");
        self.session_id = Some(session_id.clone());
        self.turn_id = None;
        Ok(session_id)
    }

    /// Attach to an existing session.
    pub async fn resume(&mut self, session_id: &str) -> AgentResult<()> {
        if self.store.get_session(session_id).await?.is_none() {
            return Err(AgentError::SessionNotFound {
                session_id: session_id.to_owned(),
            });
        }
        self.session_id = Some(session_id.to_owned());
        self.turn_id = None;
        Ok(())
    }

    /// The active session id.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    // ------------------------------------------------------------------
    // Turn management
    // ------------------------------------------------------------------

    /// Start a new conversational turn and return its id.
    pub fn new_turn(&mut self) -> String {
        let turn_id = Uuid::now_v7().to_string();
        self.turn_id = Some(turn_id.clone());
        turn_id
    }

    /// Current turn id, creating a new turn if none exists.
    pub fn turn_id(&mut self) -> String {
        match &self.turn_id {
            Some(id) => id.clone(),
            None => self.new_turn(),
        }
    }

    // ------------------------------------------------------------------
    // Event recording
    // ------------------------------------------------------------------

    /// Persist an event to the current session and return it.
    pub async fn append_event(&mut self, payload: EventPayload) -> AgentResult<SessionEvent> {
        let session_id = self
            .session_id
            .clone()
            .ok_or(AgentError::NoActiveSession)?;
        let event = SessionEvent::new(self.turn_id(), payload);
        self.store.append_event(&session_id, &event).await?;
        Ok(event)
    }

    // ------------------------------------------------------------------
    // Message derivation
    // ------------------------------------------------------------------

    /// Derive the ordered [`Message`] list from the event history.
    ///
    /// Tool-call requests that follow an assistant message are attached
    /// to that assistant message's `tool_calls` rather than emitted as
    /// separate messages, matching the chat-completion convention.
    /// Confirmation, model-switch and protocol-error events are metadata
    /// and produce no messages.
    pub async fn get_messages(&self) -> AgentResult<Vec<Message>> {
        let session_id = self
            .session_id
            .as_deref()
            .ok_or(AgentError::NoActiveSession)?;
        let events = self.store.get_events(session_id, None).await?;

        let mut messages: Vec<Message> = Vec::new();
        let mut pending_tool_calls: Vec<ToolCall> = Vec::new();

        for event in events {
            match event.payload {
                EventPayload::UserMessage { content } => {
                    flush_pending(&mut messages, &mut pending_tool_calls);
                    messages.push(Message::user(content));
                }

                EventPayload::AssistantMessage { content, model } => {
                    flush_pending(&mut messages, &mut pending_tool_calls);
                    let mut msg = Message::assistant(content);
                    msg.model = model;
                    messages.push(msg);
                }

                EventPayload::ToolCallRequest {
                    tool_call_id,
                    tool_name,
                    arguments,
                } => {
                    pending_tool_calls.push(ToolCall {
                        id: tool_call_id,
                        name: tool_name,
                        arguments,
                    });
                }

                EventPayload::ToolCallResult {
                    tool_call_id,
                    content,
                    error,
                    ..
                } => {
                    flush_pending(&mut messages, &mut pending_tool_calls);
                    let content = match error {
                        Some(error) => format!("[Error] {error}: {content}"),
                        None => content,
                    };
                    messages.push(Message::tool_result(tool_call_id, content));
                }

                EventPayload::Confirmation { .. }
                | EventPayload::ModelSwitch { .. }
                | EventPayload::ProtocolError { .. } => {}
            }
        }

        flush_pending(&mut messages, &mut pending_tool_calls);
        Ok(messages)
    }

    // ------------------------------------------------------------------
    // Context window
    // ------------------------------------------------------------------

    /// Build a token-budgeted context window from the session history.
    pub async fn get_context_window(
        &self,
        tools: Option<&[Value]>,
        system_prompt: &str,
        max_context_tokens: usize,
        max_output_tokens: usize,
        reserve_tokens: usize,
    ) -> AgentResult<(Vec<Message>, ContextPackReport)> {
        let messages = self.get_messages().await?;
        Ok(self.packer.pack(
            &messages,
            tools,
            system_prompt,
            max_context_tokens,
            max_output_tokens,
            reserve_tokens,
        ))
    }
}

/// Attach accumulated tool calls to the most recent assistant message.
fn flush_pending(messages: &mut [Message], pending: &mut Vec<ToolCall>) {
    if pending.is_empty() {
        return;
    }
    if let Some(msg) = messages
        .iter_mut()
        .rev()
        .find(|m| m.role == aegis_llm::Role::Assistant)
    {
        msg.tool_calls.append(pending);
    }
    pending.clear();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
