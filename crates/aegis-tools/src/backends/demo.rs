//! Demo backend with canned targets, for tests and offline runs.

use serde_json::{Value, json};

use super::{BackendError, BackendResult, DiagnosticInfo, ExecutionBackend};

const DEMO_TARGETS: &[&str] = &["demo-host-1", "demo-host-2", "demo-db-1"];

/// Execution backend serving fixed fixture data.
#[derive(Debug, Clone, Default)]
pub struct DemoBackend;

impl DemoBackend {
    /// Create a demo backend.
    pub fn new() -> Self {
        Self
    }

    fn check_target(target: &str) -> BackendResult<()> {
        if DEMO_TARGETS.contains(&target) {
            Ok(())
        } else {
            Err(BackendError::new(
                format!("Unknown demo target: {target}"),
                "unknown_target",
            ))
        }
    }
}

#[async_trait::async_trait]
impl ExecutionBackend for DemoBackend {
    async fn resolve_target(&self, target: &str) -> BackendResult<Value> {
        Self::check_target(target)?;
        Ok(json!({
            "type": if target.contains("db") { "database" } else { "host" },
            "hostname": format!("{target}.example.com"),
            "platform": "Linux",
            "environment": "demo",
        }))
    }

    async fn list_diagnostics(&self, target: &str) -> BackendResult<Vec<DiagnosticInfo>> {
        Self::check_target(target)?;
        Ok(vec![
            DiagnosticInfo::new("ping", "Check reachability", "host"),
            DiagnosticInfo::new("status", "Show service status", "host"),
        ])
    }

    async fn run_diagnostic(
        &self,
        action: &str,
        target: &str,
        _args: &Value,
    ) -> BackendResult<Value> {
        Self::check_target(target)?;
        match action {
            "ping" => Ok(json!({
                "target": target,
                "reachable": true,
                "latency_ms": 12,
            })),
            "status" => Ok(json!({
                "target": target,
                "state": "running",
                "uptime_seconds": 86_400,
            })),
            other => Err(BackendError::new(
                format!("Unknown diagnostic action: {other}"),
                "unknown_diagnostic",
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
