//! Shared fixtures for orchestrator integration tests: a scripted mock
//! provider and a small zoo of mock tools.

// Each test binary uses a different subset of these fixtures.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

use aegis_agent::{Orchestrator, OrchestratorConfig, Session};
use aegis_llm::{
    ChunkStream, LlmResult, LlmRouter, Message, Provider, RawToolDelta, StreamChunk, TokenCounter,
};
use aegis_policy::{PolicyConfig, PolicyEngine};
use aegis_store::{ArtifactPayload, ArtifactStore, Database, SessionStore};
use aegis_tools::{
    PrivacyScope, Tool, ToolExecResult, ToolRegistry, ToolResult, ToolRisk,
};

// ---------------------------------------------------------------------------
// Scripted provider
// ---------------------------------------------------------------------------

/// A provider that replays pre-scripted chunk sequences, one per `chat`
/// call. The last script repeats once the rest are exhausted, so loops
/// that keep calling the LLM (max-turns tests) stay fed.
pub struct ScriptedProvider {
    scripts: Vec<Vec<StreamChunk>>,
    next: Mutex<usize>,
    max_ctx: usize,
    max_out: usize,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Vec<StreamChunk>>) -> Self {
        Self {
            scripts,
            next: Mutex::new(0),
            max_ctx: 8192,
            max_out: 1024,
        }
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn max_context_tokens(&self) -> usize {
        self.max_ctx
    }

    fn max_output_tokens(&self) -> usize {
        self.max_out
    }

    fn count_tokens(&self, messages: &[Message], tools: Option<&[Value]>) -> usize {
        TokenCounter::new().count_messages(messages, tools)
    }

    async fn chat(
        &self,
        _messages: &[Message],
        _tools: Option<&[Value]>,
        _timeout: Duration,
    ) -> LlmResult<ChunkStream> {
        let script = {
            let mut next = self.next.lock().unwrap();
            let idx = (*next).min(self.scripts.len().saturating_sub(1));
            *next += 1;
            self.scripts.get(idx).cloned().unwrap_or_default()
        };
        let chunks: Vec<LlmResult<StreamChunk>> = script.into_iter().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Stream a text response one word at a time.
pub fn text_script(text: &str) -> Vec<StreamChunk> {
    let words: Vec<&str> = text.split(' ').collect();
    let mut chunks: Vec<StreamChunk> = words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let suffix = if i + 1 < words.len() { " " } else { "" };
            StreamChunk::text(format!("{word}{suffix}"))
        })
        .collect();
    chunks.push(StreamChunk::finished());
    chunks
}

/// Stream a tool call with the name and arguments split across deltas,
/// exercising the assembler.
pub fn tool_call_script(name: &str, args: &Value, call_id: &str) -> Vec<StreamChunk> {
    let args_json = args.to_string();
    let half = name.len() / 2;
    let third = (args_json.len() / 3).max(1);

    let mut chunks = vec![
        StreamChunk {
            tool_deltas: vec![RawToolDelta {
                call_index: 0,
                id: Some(call_id.to_owned()),
                name_delta: name[..half].to_owned(),
                ..Default::default()
            }],
            ..Default::default()
        },
        StreamChunk {
            tool_deltas: vec![RawToolDelta {
                call_index: 0,
                name_delta: name[half..].to_owned(),
                ..Default::default()
            }],
            ..Default::default()
        },
    ];

    let mut pos = 0;
    while pos < args_json.len() {
        let end = (pos + third).min(args_json.len());
        chunks.push(StreamChunk {
            tool_deltas: vec![RawToolDelta {
                call_index: 0,
                args_delta: args_json[pos..end].to_owned(),
                ..Default::default()
            }],
            ..Default::default()
        });
        pos = end;
    }

    chunks.push(StreamChunk {
        tool_deltas: vec![RawToolDelta {
            call_index: 0,
            done: true,
            ..Default::default()
        }],
        done: true,
        ..Default::default()
    });
    chunks
}

/// Stream a tool call whose argument JSON is malformed.
pub fn malformed_tool_call_script() -> Vec<StreamChunk> {
    vec![
        StreamChunk {
            tool_deltas: vec![RawToolDelta {
                call_index: 0,
                id: Some("call_bad".into()),
                name_delta: "broken_tool".into(),
                ..Default::default()
            }],
            ..Default::default()
        },
        StreamChunk {
            tool_deltas: vec![RawToolDelta {
                call_index: 0,
                args_delta: r#"{"key": INVALID_JSON"#.into(),
                ..Default::default()
            }],
            ..Default::default()
        },
        StreamChunk {
            tool_deltas: vec![RawToolDelta {
                call_index: 0,
                done: true,
                ..Default::default()
            }],
            done: true,
            ..Default::default()
        },
    ]
}

// ---------------------------------------------------------------------------
// Mock tools
// ---------------------------------------------------------------------------

pub struct EchoTool;

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Echoes the input message back."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {"type": "string", "description": "Message to echo"},
            },
            "required": ["message"],
        })
    }
    async fn execute(&self, arguments: Value) -> ToolExecResult {
        Ok(ToolResult::ok(
            arguments["message"].as_str().unwrap_or_default(),
        ))
    }
}

pub struct WriteTool;

#[async_trait::async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &str {
        "write_file"
    }
    fn description(&self) -> &str {
        "Writes content to a file path."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"},
            },
            "required": ["path", "content"],
        })
    }
    fn risk_level(&self) -> ToolRisk {
        ToolRisk::Write
    }
    async fn execute(&self, arguments: Value) -> ToolExecResult {
        Ok(ToolResult::ok(format!(
            "Wrote to {}",
            arguments["path"].as_str().unwrap_or_default()
        )))
    }
}

pub struct DestructiveTool;

#[async_trait::async_trait]
impl Tool for DestructiveTool {
    fn name(&self) -> &str {
        "delete_resource"
    }
    fn description(&self) -> &str {
        "Deletes a resource by ID."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "resource_id": {"type": "string"},
            },
            "required": ["resource_id"],
        })
    }
    fn risk_level(&self) -> ToolRisk {
        ToolRisk::Destructive
    }
    fn privacy_scope(&self) -> PrivacyScope {
        PrivacyScope::Sensitive
    }
    async fn execute(&self, arguments: Value) -> ToolExecResult {
        Ok(ToolResult::ok(format!(
            "Deleted {}",
            arguments["resource_id"].as_str().unwrap_or_default()
        )))
    }
}

pub struct ShellTool;

#[async_trait::async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }
    fn description(&self) -> &str {
        "Executes a shell command."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string"},
                "timeout": {"type": "integer"},
            },
            "required": ["command"],
        })
    }
    fn risk_level(&self) -> ToolRisk {
        ToolRisk::Shell
    }
    fn privacy_scope(&self) -> PrivacyScope {
        PrivacyScope::Secret
    }
    fn secret_fields(&self) -> Vec<String> {
        vec!["command".into()]
    }
    async fn execute(&self, arguments: Value) -> ToolExecResult {
        Ok(ToolResult::ok(format!(
            "Executed: {}",
            arguments["command"].as_str().unwrap_or_default()
        )))
    }
}

/// Sleeps longer than any sane tool timeout.
pub struct SleepTool;

#[async_trait::async_trait]
impl Tool for SleepTool {
    fn name(&self) -> &str {
        "sleep"
    }
    fn description(&self) -> &str {
        "Sleeps for a long time."
    }
    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _arguments: Value) -> ToolExecResult {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(ToolResult::ok("woke up"))
    }
}

/// Always returns an execution error.
pub struct FailingTool;

#[async_trait::async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "failing"
    }
    fn description(&self) -> &str {
        "Always fails."
    }
    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _arguments: Value) -> ToolExecResult {
        Err(aegis_tools::ToolError::Execution("kaboom".into()))
    }
}

/// Produces an artifact payload on success.
pub struct ArtifactTool;

#[async_trait::async_trait]
impl Tool for ArtifactTool {
    fn name(&self) -> &str {
        "collect"
    }
    fn description(&self) -> &str {
        "Collects diagnostic output into an artifact."
    }
    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _arguments: Value) -> ToolExecResult {
        Ok(ToolResult::ok("collected").with_artifact_payload(ArtifactPayload {
            content: b"diagnostic dump".to_vec(),
            original_name: "dump.txt".into(),
            media_type: "text/plain".into(),
            description: "test artifact".into(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Fixture assembly
// ---------------------------------------------------------------------------

pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(EchoTool), false).unwrap();
    registry.register(Arc::new(WriteTool), false).unwrap();
    registry.register(Arc::new(DestructiveTool), false).unwrap();
    registry.register(Arc::new(ShellTool), false).unwrap();
    registry.register(Arc::new(SleepTool), false).unwrap();
    registry.register(Arc::new(FailingTool), false).unwrap();
    registry.register(Arc::new(ArtifactTool), false).unwrap();
    registry
}

pub fn permissive_policy(dir: &tempfile::TempDir) -> PolicyConfig {
    PolicyConfig {
        max_risk: ToolRisk::Shell,
        confirm_destructive: false,
        confirm_shell: false,
        confirm_write: false,
        audit_log_path: dir.path().join("audit.jsonl"),
        ..Default::default()
    }
}

pub async fn fresh_session(dir: &tempfile::TempDir) -> Session {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().await.unwrap();
    let store = Arc::new(SessionStore::new(db));
    let artifacts = Arc::new(ArtifactStore::new(dir.path().join("artifacts")).unwrap());
    let mut session = Session::new(store, artifacts, TokenCounter::new());
    session.start(None).await.unwrap();
    session
}

pub async fn build_orchestrator(
    dir: &tempfile::TempDir,
    scripts: Vec<Vec<StreamChunk>>,
    policy_config: PolicyConfig,
    config: OrchestratorConfig,
) -> Orchestrator {
    let session = fresh_session(dir).await;
    let mut router = LlmRouter::new();
    router.register_provider("mock", Arc::new(ScriptedProvider::new(scripts)));
    let policy = PolicyEngine::new(policy_config).unwrap();
    Orchestrator::new(session, default_registry(), router, policy, config)
}

/// Drain the run stream, panicking on fatal errors.
pub async fn collect_chunks(orchestrator: &mut Orchestrator, input: &str) -> Vec<StreamChunk> {
    use futures::StreamExt;
    let mut chunks = Vec::new();
    let mut stream = std::pin::pin!(orchestrator.run(input.to_owned()));
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk.expect("run failed"));
    }
    chunks
}

/// Convenience: all `tool_call_result` payloads in event order.
pub async fn result_payloads(
    orchestrator: &Orchestrator,
) -> Vec<(String, bool, Option<String>, String)> {
    let session_id = orchestrator.session().session_id().unwrap().to_owned();
    let events = orchestrator
        .session()
        .event_store()
        .get_events(&session_id, Some(aegis_store::EventType::ToolCallResult))
        .await
        .unwrap();
    events
        .into_iter()
        .map(|e| match e.payload {
            aegis_store::EventPayload::ToolCallResult {
                tool_name,
                success,
                error_code,
                tool_call_id,
                ..
            } => (tool_name, success, error_code, tool_call_id),
            other => panic!("unexpected payload: {other:?}"),
        })
        .collect()
}

/// All event-type names for a session, in append order.
pub async fn event_type_names(orchestrator: &Orchestrator) -> Vec<&'static str> {
    let session_id = orchestrator.session().session_id().unwrap().to_owned();
    orchestrator
        .session()
        .event_store()
        .get_events(&session_id, None)
        .await
        .unwrap()
        .iter()
        .map(|e| e.event_type().as_str())
        .collect()
}
