//! Bridge tools connecting the execution-backend interface and the
//! artifact store to the tool registry.
//!
//! Target is always explicit per tool call, never implicit.

use std::sync::Arc;

use serde_json::{Value, json};

use aegis_store::ArtifactStore;

use crate::backends::ExecutionBackend;
use crate::result::{ErrorCode, ToolExecResult, ToolResult};
use crate::tool::{Tool, ToolRisk};

fn string_arg(arguments: &Value, key: &str) -> String {
    arguments[key].as_str().unwrap_or_default().to_owned()
}

// ---------------------------------------------------------------------------
// resolve_target
// ---------------------------------------------------------------------------

/// Resolve a target identifier to structured information.
pub struct ResolveTargetTool {
    backend: Arc<dyn ExecutionBackend>,
}

impl ResolveTargetTool {
    /// Wrap a backend.
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait::async_trait]
impl Tool for ResolveTargetTool {
    fn name(&self) -> &str {
        "resolve_target"
    }

    fn description(&self) -> &str {
        "Resolve a target identifier (hostname, service name, etc.) to structured information about it."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "target": {
                    "type": "string",
                    "description": "The target identifier to resolve.",
                },
            },
            "required": ["target"],
        })
    }

    async fn execute(&self, arguments: Value) -> ToolExecResult {
        let target = string_arg(&arguments, "target");
        match self.backend.resolve_target(&target).await {
            Ok(info) => {
                let pretty = serde_json::to_string_pretty(&info)?;
                Ok(ToolResult::ok(pretty).with_data(info))
            }
            Err(e) => Ok(ToolResult::failure(
                e.to_string(),
                e.to_string(),
                ErrorCode::BackendError,
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// list_diagnostics
// ---------------------------------------------------------------------------

/// List available diagnostics for a target.
pub struct ListDiagnosticsTool {
    backend: Arc<dyn ExecutionBackend>,
}

impl ListDiagnosticsTool {
    /// Wrap a backend.
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait::async_trait]
impl Tool for ListDiagnosticsTool {
    fn name(&self) -> &str {
        "list_diagnostics"
    }

    fn description(&self) -> &str {
        "List all available diagnostic actions for a given target."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "target": {
                    "type": "string",
                    "description": "The target to list diagnostics for.",
                },
            },
            "required": ["target"],
        })
    }

    async fn execute(&self, arguments: Value) -> ToolExecResult {
        let target = string_arg(&arguments, "target");
        match self.backend.list_diagnostics(&target).await {
            Ok(diags) => {
                let lines: Vec<String> = diags
                    .iter()
                    .map(|d| format!("- {}: {}", d.name, d.description))
                    .collect();
                let content = if lines.is_empty() {
                    "No diagnostics available.".to_owned()
                } else {
                    lines.join("\n")
                };
                Ok(ToolResult::ok(content).with_data(serde_json::to_value(&diags)?))
            }
            Err(e) => Ok(ToolResult::failure(
                e.to_string(),
                e.to_string(),
                ErrorCode::BackendError,
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// run_diagnostic
// ---------------------------------------------------------------------------

/// Run a diagnostic action against a target.
pub struct RunDiagnosticTool {
    backend: Arc<dyn ExecutionBackend>,
}

impl RunDiagnosticTool {
    /// Wrap a backend.
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait::async_trait]
impl Tool for RunDiagnosticTool {
    fn name(&self) -> &str {
        "run_diagnostic"
    }

    fn description(&self) -> &str {
        "Run a specific diagnostic action against a target. Target is always required."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "description": "The diagnostic action to run (e.g. ping, uptime).",
                },
                "target": {
                    "type": "string",
                    "description": "The target to run the diagnostic against.",
                },
            },
            "required": ["action", "target"],
            "additionalProperties": true,
        })
    }

    fn risk_level(&self) -> ToolRisk {
        ToolRisk::Write
    }

    async fn execute(&self, arguments: Value) -> ToolExecResult {
        let action = string_arg(&arguments, "action");
        let target = string_arg(&arguments, "target");

        // Remaining keys pass through as action arguments.
        let mut extra = arguments;
        if let Some(obj) = extra.as_object_mut() {
            obj.remove("action");
            obj.remove("target");
        }

        match self.backend.run_diagnostic(&action, &target, &extra).await {
            Ok(result) => {
                let pretty = serde_json::to_string_pretty(&result)?;
                Ok(ToolResult::ok(pretty).with_data(result))
            }
            Err(e) => Ok(ToolResult::failure(
                e.to_string(),
                e.to_string(),
                ErrorCode::BackendError,
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// summarize_artifact
// ---------------------------------------------------------------------------

/// Retrieve and summarize a stored artifact.
pub struct SummarizeArtifactTool {
    store: Arc<ArtifactStore>,
}

impl SummarizeArtifactTool {
    /// Wrap an artifact store.
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for SummarizeArtifactTool {
    fn name(&self) -> &str {
        "summarize_artifact"
    }

    fn description(&self) -> &str {
        "Retrieve a stored artifact by its SHA-256 hash and return a text summary of its contents."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sha256": {
                    "type": "string",
                    "description": "SHA-256 hash of the artifact to summarize.",
                },
            },
            "required": ["sha256"],
        })
    }

    async fn execute(&self, arguments: Value) -> ToolExecResult {
        let sha = string_arg(&arguments, "sha256");

        let data = match self.store.read(&sha) {
            Ok(data) => data,
            Err(e) => {
                return Ok(ToolResult::failure(
                    e.to_string(),
                    e.to_string(),
                    ErrorCode::BackendError,
                ));
            }
        };

        let size = data.len();
        let text: String = String::from_utf8_lossy(&data).chars().take(4000).collect();
        let short = &sha[..sha.len().min(12)];

        Ok(
            ToolResult::ok(format!("Artifact {short}... ({size} bytes):\n{text}")).with_data(
                json!({
                    "sha256": sha,
                    "size_bytes": size,
                    "preview": text.chars().take(500).collect::<String>(),
                }),
            ),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
