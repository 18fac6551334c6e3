//! Orchestrator core — the main loop that ties everything together.
//!
//! For each user input the orchestrator:
//!
//! 1. opens a new turn and records the `user_message` event
//! 2. builds a token-budgeted context window from session history
//! 3. streams the LLM through the router with the tool schemas
//! 4. runs every assembled tool call through the full lifecycle
//! 5. loops until the LLM replies without tool calls, an unrecoverable
//!    protocol error occurs, or the turn cap is hit
//!
//! The returned stream yields [`StreamChunk`]s for UI rendering. Tool
//! calls execute sequentially in assembled order; every call that starts
//! gets a matching `tool_call_result` event before the stream ends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::Stream;
use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, info, warn};

use aegis_llm::{AssembledAssistant, LlmRouter, Message, StreamChunk, ToolCall};
use aegis_policy::{AuditContext, PolicyEngine};
use aegis_store::EventPayload;
use aegis_tools::{ErrorCode, ToolRegistry, ToolResult, validation};

use crate::error::AgentResult;
use crate::session::Session;

/// Async callback asking the user to confirm a gated tool call.
/// Receives `(tool_name, tool_call)` and resolves to the decision.
pub type ConfirmationCallback =
    Arc<dyn Fn(&str, &ToolCall) -> BoxFuture<'static, bool> + Send + Sync>;

/// Fallback text when the provider stream breaks the tool-call protocol.
const PROTOCOL_ERROR_APOLOGY: &str =
    "I encountered a protocol error processing tool calls. Please try rephrasing your request.";

/// Configuration for the orchestrator loop.
#[derive(Clone)]
pub struct OrchestratorConfig {
    /// System prompt prepended to every LLM call.
    pub system_prompt: String,
    /// Hard deadline for a single tool execution.
    pub tool_timeout: Duration,
    /// Per-chunk read timeout handed to the provider.
    pub stream_timeout: Duration,
    /// Max tool-call rounds before forcing a text response.
    pub max_turns: u32,
    /// Hard token reserve the packer must never eat into.
    pub reserve_tokens: usize,
    /// Callback for tool confirmation. `None` denies every gated call.
    pub confirmation_callback: Option<ConfirmationCallback>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            tool_timeout: Duration::from_secs(30),
            stream_timeout: Duration::from_secs(30),
            max_turns: 20,
            reserve_tokens: 200,
            confirmation_callback: None,
        }
    }
}

/// Main orchestrator loop over a session, registry, router and policy.
pub struct Orchestrator {
    session: Session,
    registry: ToolRegistry,
    router: LlmRouter,
    policy: PolicyEngine,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Assemble an orchestrator. The registry is treated as frozen for
    /// the duration of every run.
    pub fn new(
        session: Session,
        registry: ToolRegistry,
        router: LlmRouter,
        policy: PolicyEngine,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            session,
            registry,
            router,
            policy,
            config,
        }
    }

    /// The underlying session manager.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable access to the session manager (for `start`/`resume`).
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Switch the active provider, recording a `model_switch` event.
    ///
    /// Must not be called while a run is in flight; the router snapshots
    /// the active provider at each `chat_complete` entry.
    pub async fn switch_provider(&mut self, name: &str) -> AgentResult<()> {
        let from = self.router.active_name().unwrap_or_default().to_owned();
        self.router.set_active(name)?;
        self.session
            .append_event(EventPayload::ModelSwitch {
                from_model: from.clone(),
                to_model: name.to_owned(),
            })
            .await?;
        info!(from = %from, to = %name, "active provider switched");
        Ok(())
    }

    /// Process one user input through the full loop.
    ///
    /// Yields [`StreamChunk`]s for rendering. The only fatal errors are
    /// event-store and provider failures; tool-level failures become
    /// `tool_call_result` events and model-visible error messages.
    pub fn run(
        &mut self,
        user_input: String,
    ) -> impl Stream<Item = AgentResult<StreamChunk>> + Send + '_ {
        async_stream::stream! {
            let turn_id = self.session.new_turn();
            info!(turn_id = %turn_id, "orchestrator run started");

            if let Err(err) = self
                .session
                .append_event(EventPayload::UserMessage { content: user_input })
                .await
            {
                yield Err(err);
                return;
            }

            let tools_schema = self.registry.schema_values();
            let tools = if tools_schema.is_empty() {
                None
            } else {
                Some(tools_schema.as_slice())
            };

            for round in 0..self.config.max_turns {
                debug!(round, "llm round started");

                let assembled = match self.ask_llm(tools).await {
                    Ok(assembled) => assembled,
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                };

                // Protocol errors terminate the run.
                if !assembled.assembler_errors.is_empty() {
                    warn!(errors = ?assembled.assembler_errors, "llm protocol error");
                    let fallback = match self.record_protocol_error(assembled).await {
                        Ok(text) => text,
                        Err(err) => {
                            yield Err(err);
                            return;
                        }
                    };
                    yield Ok(StreamChunk {
                        delta: fallback,
                        done: true,
                        ..Default::default()
                    });
                    return;
                }

                // No tool calls: final response.
                if assembled.tool_calls.is_empty() {
                    if !assembled.content.is_empty() {
                        if let Err(err) = self
                            .session
                            .append_event(EventPayload::AssistantMessage {
                                content: assembled.content.clone(),
                                model: assembled.model,
                            })
                            .await
                        {
                            yield Err(err);
                            return;
                        }
                        yield Ok(StreamChunk {
                            delta: assembled.content,
                            done: true,
                            ..Default::default()
                        });
                    }
                    return;
                }

                // Record assistant text preceding the tool calls.
                if !assembled.content.is_empty() {
                    if let Err(err) = self
                        .session
                        .append_event(EventPayload::AssistantMessage {
                            content: assembled.content.clone(),
                            model: assembled.model.clone(),
                        })
                        .await
                    {
                        yield Err(err);
                        return;
                    }
                    yield Ok(StreamChunk::text(assembled.content.clone()));
                }

                // Execute the calls sequentially, in assembled order.
                let mut failed = false;
                for call in &assembled.tool_calls {
                    match self.execute_tool_call(call).await {
                        Ok(result) => {
                            yield Ok(StreamChunk::text(tool_summary(call, &result)));
                        }
                        Err(err) => {
                            yield Err(err);
                            failed = true;
                            break;
                        }
                    }
                }
                if failed {
                    return;
                }
            }

            // Turn cap exhausted.
            let cap_message = format!(
                "Reached maximum of {} tool call rounds. Please provide more specific guidance.",
                self.config.max_turns
            );
            if let Err(err) = self
                .session
                .append_event(EventPayload::AssistantMessage {
                    content: cap_message.clone(),
                    model: None,
                })
                .await
            {
                yield Err(err);
                return;
            }
            yield Ok(StreamChunk {
                delta: cap_message,
                done: true,
                ..Default::default()
            });
        }
    }

    // ------------------------------------------------------------------
    // Round helpers
    // ------------------------------------------------------------------

    /// Build the context window for the active provider and stream one
    /// assembled assistant turn.
    async fn ask_llm(
        &mut self,
        tools: Option<&[serde_json::Value]>,
    ) -> AgentResult<AssembledAssistant> {
        let provider = self.router.active_provider()?;
        let (mut messages, report) = self
            .session
            .get_context_window(
                tools,
                &self.config.system_prompt,
                provider.max_context_tokens(),
                provider.max_output_tokens(),
                self.config.reserve_tokens,
            )
            .await?;

        if report.dropped_messages > 0 {
            debug!(
                kept = report.kept_messages,
                dropped = report.dropped_messages,
                "context window trimmed"
            );
        }

        if !self.config.system_prompt.is_empty() {
            messages.insert(0, Message::system(self.config.system_prompt.clone()));
        }

        Ok(self
            .router
            .chat_complete(&messages, tools, self.config.stream_timeout)
            .await?)
    }

    /// Record a protocol error and the terminal assistant message.
    /// Returns the text to surface to the user.
    async fn record_protocol_error(
        &mut self,
        assembled: AssembledAssistant,
    ) -> AgentResult<String> {
        self.session
            .append_event(EventPayload::ProtocolError {
                message: "Tool call assembly failed".into(),
                details: Some(json!({"errors": assembled.assembler_errors})),
            })
            .await?;

        let text = if assembled.content.is_empty() {
            PROTOCOL_ERROR_APOLOGY.to_owned()
        } else {
            assembled.content
        };
        self.session
            .append_event(EventPayload::AssistantMessage {
                content: text.clone(),
                model: assembled.model,
            })
            .await?;
        Ok(text)
    }

    // ------------------------------------------------------------------
    // Tool-call lifecycle
    // ------------------------------------------------------------------

    /// Run one tool call through the full lifecycle and return its result.
    ///
    /// An `Err` from this function means the event store failed; every
    /// tool-level failure comes back as an `Ok` result with an error code
    /// and a matching `tool_call_result` event already recorded.
    async fn execute_tool_call(&mut self, call: &ToolCall) -> AgentResult<ToolResult> {
        // 1. Record the request.
        let request_event = self
            .session
            .append_event(EventPayload::ToolCallRequest {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
            })
            .await?;

        // 2. Registry lookup.
        let Some(tool) = self.registry.get(&call.name) else {
            let message = format!("Unknown tool: {}", call.name);
            let result = ToolResult::failure(message.clone(), message, ErrorCode::UnknownTool);
            self.append_result(call, &result).await?;
            return Ok(result);
        };

        // 3. Schema validation.
        if let Err(message) = validation::validate(tool.as_ref(), &call.arguments) {
            let result = ToolResult::failure(
                format!("Validation error: {message}"),
                message,
                ErrorCode::ValidationError,
            );
            self.append_result(call, &result).await?;
            return Ok(result);
        }

        // 4. Policy check.
        let decision = self.policy.check(tool.as_ref(), &call.arguments);
        if !decision.allowed {
            let result = ToolResult::failure(
                format!("Policy blocked: {}", decision.reason),
                decision.reason,
                ErrorCode::PolicyBlock,
            );
            self.append_result(call, &result).await?;
            return Ok(result);
        }

        // 5. Confirmation.
        if decision.requires_confirmation {
            let confirmed = match &self.config.confirmation_callback {
                Some(callback) => callback(&call.name, call).await,
                None => false,
            };
            self.session
                .append_event(EventPayload::Confirmation {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    confirmed,
                })
                .await?;

            if !confirmed {
                let result = ToolResult::failure(
                    "Tool call cancelled by user",
                    "User declined confirmation",
                    ErrorCode::Cancelled,
                );
                self.append_result(call, &result).await?;
                return Ok(result);
            }
        }

        // 6. Execute under the deadline.
        let started = Instant::now();
        let mut result = match tokio::time::timeout(
            self.config.tool_timeout,
            tool.execute(call.arguments.clone()),
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!(tool = %call.name, error = %err, "tool execution failed");
                ToolResult::failure(
                    format!("Tool exception: {err}"),
                    err.to_string(),
                    ErrorCode::ToolException,
                )
            }
            Err(_) => {
                warn!(tool = %call.name, timeout = ?self.config.tool_timeout, "tool timed out");
                ToolResult::failure(
                    format!("Tool timed out after {:?}", self.config.tool_timeout),
                    format!("Timeout after {:?}", self.config.tool_timeout),
                    ErrorCode::Timeout,
                )
            }
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        // 7. Persist artifact payloads on success. Artifact-store failures
        // are logged; the tool call is still recorded.
        if result.success && !result.artifact_payloads.is_empty() {
            let payloads = std::mem::take(&mut result.artifact_payloads);
            for payload in payloads {
                match self.session.artifact_store().store(&payload) {
                    Ok(stored) => result.artifacts.push(stored),
                    Err(err) => {
                        warn!(error = %err, "artifact store failed; dropping payload");
                    }
                }
            }
        }

        // 8. Audit. Never fatal.
        let audit_ctx = AuditContext {
            session_id: self.session.session_id().unwrap_or_default().to_owned(),
            event_id: request_event.event_id.clone(),
            tool_call_id: call.id.clone(),
        };
        if let Err(err) = self
            .policy
            .audit_log(&audit_ctx, tool.as_ref(), &call.arguments, &result, duration_ms)
            .await
        {
            warn!(error = %err, "audit log write failed");
        }

        // 9. Record the result.
        self.append_result(call, &result).await?;
        Ok(result)
    }

    async fn append_result(&mut self, call: &ToolCall, result: &ToolResult) -> AgentResult<()> {
        self.session
            .append_event(EventPayload::ToolCallResult {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                success: result.success,
                content: result.content.clone(),
                data: result.data.clone(),
                error: result.error.clone(),
                error_code: result.error_code.map(|c| c.as_str().to_owned()),
                metadata: result.metadata.clone(),
            })
            .await?;
        Ok(())
    }
}

/// Short per-tool summary chunk shown between rounds.
fn tool_summary(call: &ToolCall, result: &ToolResult) -> String {
    let summary = if result.success {
        result.content.clone()
    } else {
        format!(
            "[Error: {}] {}",
            result.error_code.map(|c| c.as_str()).unwrap_or("error"),
            result.error.as_deref().unwrap_or(&result.content),
        )
    };
    let summary: String = summary.chars().take(200).collect();
    format!("\n[Tool: {}] {summary}\n", call.name)
}
