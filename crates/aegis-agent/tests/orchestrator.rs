//! Tool-call lifecycle tests for the orchestrator.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use aegis_agent::{ConfirmationCallback, OrchestratorConfig};
use aegis_policy::PolicyConfig;
use aegis_tools::ToolRisk;

use common::{
    build_orchestrator, collect_chunks, event_type_names, malformed_tool_call_script,
    permissive_policy, result_payloads, text_script, tool_call_script,
};

fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        tool_timeout: Duration::from_millis(500),
        max_turns: 10,
        ..Default::default()
    }
}

#[tokio::test]
async fn echo_tool_full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let mut orch = build_orchestrator(
        &dir,
        vec![
            tool_call_script("echo", &json!({"message": "hello"}), "call_1"),
            text_script("Echo result: hello"),
        ],
        permissive_policy(&dir),
        fast_config(),
    )
    .await;

    let chunks = collect_chunks(&mut orch, "test echo").await;
    let all_text: String = chunks.iter().map(|c| c.delta.as_str()).collect();
    assert!(all_text.contains("hello"));

    let results = result_payloads(&orch).await;
    assert_eq!(results.len(), 1);
    let (tool_name, success, error_code, tool_call_id) = &results[0];
    assert_eq!(tool_name, "echo");
    assert!(success);
    assert!(error_code.is_none());
    assert_eq!(tool_call_id, "call_1");
}

#[tokio::test]
async fn events_recorded_for_plain_text_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut orch = build_orchestrator(
        &dir,
        vec![text_script("Simple response")],
        permissive_policy(&dir),
        fast_config(),
    )
    .await;

    collect_chunks(&mut orch, "test message").await;

    let types = event_type_names(&orch).await;
    assert_eq!(types, vec!["user_message", "assistant_message"]);
}

#[tokio::test]
async fn unknown_tool_produces_error_result() {
    let dir = tempfile::tempdir().unwrap();
    let mut orch = build_orchestrator(
        &dir,
        vec![
            tool_call_script("nonexistent_tool", &json!({"arg": "val"}), "call_1"),
            text_script("I see the tool failed."),
        ],
        permissive_policy(&dir),
        fast_config(),
    )
    .await;

    collect_chunks(&mut orch, "use nonexistent tool").await;

    let results = result_payloads(&orch).await;
    assert_eq!(results.len(), 1);
    assert!(!results[0].1);
    assert_eq!(results[0].2.as_deref(), Some("unknown_tool"));
}

#[tokio::test]
async fn invalid_arguments_produce_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    // echo requires a string message; send an integer.
    let mut orch = build_orchestrator(
        &dir,
        vec![
            tool_call_script("echo", &json!({"message": 12345}), "call_1"),
            text_script("Validation failed."),
        ],
        permissive_policy(&dir),
        fast_config(),
    )
    .await;

    collect_chunks(&mut orch, "test bad args").await;

    let results = result_payloads(&orch).await;
    assert_eq!(results[0].2.as_deref(), Some("validation_error"));
}

#[tokio::test]
async fn policy_blocks_risk_above_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let mut orch = build_orchestrator(
        &dir,
        vec![
            tool_call_script(
                "write_file",
                &json!({"path": "/tmp/x", "content": "data"}),
                "call_1",
            ),
            text_script("Understood."),
        ],
        PolicyConfig {
            max_risk: ToolRisk::ReadOnly,
            ..permissive_policy(&dir)
        },
        fast_config(),
    )
    .await;

    collect_chunks(&mut orch, "write a file").await;

    let results = result_payloads(&orch).await;
    assert_eq!(results[0].2.as_deref(), Some("policy_block"));

    // The reason names both the tool's risk and the ceiling.
    let session_id = orch.session().session_id().unwrap().to_owned();
    let events = orch
        .session()
        .event_store()
        .get_events(&session_id, Some(aegis_store::EventType::ToolCallResult))
        .await
        .unwrap();
    let aegis_store::EventPayload::ToolCallResult { error, .. } = &events[0].payload else {
        panic!("expected tool_call_result");
    };
    let reason = error.as_deref().unwrap();
    assert!(reason.contains("risk_too_high"));
    assert!(reason.contains("WRITE"));
}

#[tokio::test]
async fn confirmation_denied_yields_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let mut orch = build_orchestrator(
        &dir,
        vec![
            tool_call_script("delete_resource", &json!({"resource_id": "db-1"}), "call_1"),
            text_script("Cancelled then."),
        ],
        PolicyConfig {
            confirm_destructive: true,
            ..permissive_policy(&dir)
        },
        {
            let deny: ConfirmationCallback = Arc::new(|_name, _call| Box::pin(async { false }));
            OrchestratorConfig {
                confirmation_callback: Some(deny),
                ..fast_config()
            }
        },
    )
    .await;

    collect_chunks(&mut orch, "delete the database").await;

    let types = event_type_names(&orch).await;
    let confirm_pos = types.iter().position(|t| *t == "confirmation").unwrap();
    let result_pos = types.iter().position(|t| *t == "tool_call_result").unwrap();
    assert!(confirm_pos < result_pos);

    let session_id = orch.session().session_id().unwrap().to_owned();
    let confirmations = orch
        .session()
        .event_store()
        .get_events(&session_id, Some(aegis_store::EventType::Confirmation))
        .await
        .unwrap();
    let aegis_store::EventPayload::Confirmation { confirmed, .. } = &confirmations[0].payload
    else {
        panic!("expected confirmation");
    };
    assert!(!confirmed);

    let results = result_payloads(&orch).await;
    assert_eq!(results[0].2.as_deref(), Some("cancelled"));
}

#[tokio::test]
async fn confirmation_granted_executes_tool() {
    let dir = tempfile::tempdir().unwrap();
    let mut orch = build_orchestrator(
        &dir,
        vec![
            tool_call_script("delete_resource", &json!({"resource_id": "db-1"}), "call_1"),
            text_script("Deleted."),
        ],
        PolicyConfig {
            confirm_destructive: true,
            ..permissive_policy(&dir)
        },
        {
            let grant: ConfirmationCallback = Arc::new(|_name, _call| Box::pin(async { true }));
            OrchestratorConfig {
                confirmation_callback: Some(grant),
                ..fast_config()
            }
        },
    )
    .await;

    collect_chunks(&mut orch, "delete the database").await;

    let results = result_payloads(&orch).await;
    assert!(results[0].1, "tool should have executed");
}

#[tokio::test]
async fn missing_callback_denies_gated_calls() {
    let dir = tempfile::tempdir().unwrap();
    let mut orch = build_orchestrator(
        &dir,
        vec![
            tool_call_script("delete_resource", &json!({"resource_id": "db-1"}), "call_1"),
            text_script("ok"),
        ],
        PolicyConfig {
            confirm_destructive: true,
            ..permissive_policy(&dir)
        },
        fast_config(),
    )
    .await;

    collect_chunks(&mut orch, "delete it").await;
    let results = result_payloads(&orch).await;
    assert_eq!(results[0].2.as_deref(), Some("cancelled"));
}

#[tokio::test]
async fn slow_tool_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let mut orch = build_orchestrator(
        &dir,
        vec![
            tool_call_script("sleep", &json!({}), "call_1"),
            text_script("Too slow."),
        ],
        permissive_policy(&dir),
        OrchestratorConfig {
            tool_timeout: Duration::from_millis(100),
            ..fast_config()
        },
    )
    .await;

    collect_chunks(&mut orch, "sleep").await;
    let results = result_payloads(&orch).await;
    assert_eq!(results[0].2.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn tool_error_becomes_tool_exception() {
    let dir = tempfile::tempdir().unwrap();
    let mut orch = build_orchestrator(
        &dir,
        vec![
            tool_call_script("failing", &json!({}), "call_1"),
            text_script("That broke."),
        ],
        permissive_policy(&dir),
        fast_config(),
    )
    .await;

    collect_chunks(&mut orch, "fail").await;
    let results = result_payloads(&orch).await;
    assert_eq!(results[0].2.as_deref(), Some("tool_exception"));
}

#[tokio::test]
async fn artifact_payloads_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let mut orch = build_orchestrator(
        &dir,
        vec![
            tool_call_script("collect", &json!({}), "call_1"),
            text_script("Collected."),
        ],
        permissive_policy(&dir),
        fast_config(),
    )
    .await;

    collect_chunks(&mut orch, "collect diagnostics").await;

    // The stored artifact is retrievable by content hash.
    let store = orch.session().artifact_store().clone();
    let sha = hex_sha256(b"diagnostic dump");
    assert!(store.exists(&sha).unwrap());
    assert_eq!(store.read(&sha).unwrap(), b"diagnostic dump");
}

#[tokio::test]
async fn malformed_tool_json_terminates_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut orch = build_orchestrator(
        &dir,
        vec![
            malformed_tool_call_script(),
            text_script("should never be reached"),
        ],
        permissive_policy(&dir),
        fast_config(),
    )
    .await;

    let chunks = collect_chunks(&mut orch, "trigger bad json").await;

    // A single fallback message, marked done.
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].done);
    assert!(chunks[0].delta.contains("protocol error"));

    let types = event_type_names(&orch).await;
    assert_eq!(
        types,
        vec!["user_message", "protocol_error", "assistant_message"]
    );
    assert!(!types.contains(&"tool_call_request"));
}

#[tokio::test]
async fn max_turns_terminates_with_cap_message() {
    let dir = tempfile::tempdir().unwrap();
    // The single script repeats forever: every round is another echo call.
    let mut orch = build_orchestrator(
        &dir,
        vec![tool_call_script("echo", &json!({"message": "again"}), "call_1")],
        permissive_policy(&dir),
        OrchestratorConfig {
            max_turns: 3,
            ..fast_config()
        },
    )
    .await;

    let chunks = collect_chunks(&mut orch, "loop forever").await;
    let last = chunks.last().unwrap();
    assert!(last.done);
    assert!(last.delta.contains("maximum of 3 tool call rounds"));

    let results = result_payloads(&orch).await;
    assert_eq!(results.len(), 3);

    let types = event_type_names(&orch).await;
    assert_eq!(
        types.iter().filter(|t| **t == "tool_call_request").count(),
        3
    );
}

#[tokio::test]
async fn requests_and_results_pair_by_call_id() {
    let dir = tempfile::tempdir().unwrap();
    let mut orch = build_orchestrator(
        &dir,
        vec![
            tool_call_script("echo", &json!({"message": "one"}), "call_a"),
            tool_call_script("failing", &json!({}), "call_b"),
            text_script("done"),
        ],
        permissive_policy(&dir),
        fast_config(),
    )
    .await;

    collect_chunks(&mut orch, "two rounds").await;

    let session_id = orch.session().session_id().unwrap().to_owned();
    let events = orch
        .session()
        .event_store()
        .get_events(&session_id, None)
        .await
        .unwrap();

    let mut requests = Vec::new();
    let mut results = Vec::new();
    for event in &events {
        match &event.payload {
            aegis_store::EventPayload::ToolCallRequest { tool_call_id, .. } => {
                requests.push(tool_call_id.clone());
            }
            aegis_store::EventPayload::ToolCallResult { tool_call_id, .. } => {
                results.push(tool_call_id.clone());
            }
            _ => {}
        }
    }
    assert_eq!(requests, results);
    assert_eq!(requests, vec!["call_a", "call_b"]);
}

#[tokio::test]
async fn audit_log_written_for_executed_tools() {
    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let mut orch = build_orchestrator(
        &dir,
        vec![
            tool_call_script("shell", &json!({"command": "ls -la"}), "call_1"),
            text_script("Ran it."),
        ],
        permissive_policy(&dir),
        fast_config(),
    )
    .await;

    collect_chunks(&mut orch, "run shell").await;

    let content = std::fs::read_to_string(&audit_path).unwrap();
    let record: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
    assert_eq!(record["tool_name"], "shell");
    assert_eq!(record["risk"], "SHELL");
    // SECRET scope: neither args nor output appear.
    assert_eq!(record["args"], "***REDACTED***");
    assert_eq!(record["output"], "***REDACTED***");
    assert!(!content.contains("ls -la"));
}

#[tokio::test]
async fn switch_provider_records_model_switch_event() {
    let dir = tempfile::tempdir().unwrap();
    let mut orch = build_orchestrator(
        &dir,
        vec![text_script("hi")],
        permissive_policy(&dir),
        fast_config(),
    )
    .await;

    orch.switch_provider("mock").await.unwrap();

    let types = event_type_names(&orch).await;
    assert_eq!(types, vec!["model_switch"]);

    let err = orch.switch_provider("missing").await.unwrap_err();
    assert!(matches!(err, aegis_agent::AgentError::Llm(_)));
}

// Hash via a scratch artifact store so this test crate does not need
// sha2 directly.
fn hex_sha256(data: &[u8]) -> String {
    let dir = tempfile::tempdir().unwrap();
    let store = aegis_store::ArtifactStore::new(dir.path()).unwrap();
    store
        .store(&aegis_store::ArtifactPayload::new(data.to_vec()))
        .unwrap()
        .sha256
}
