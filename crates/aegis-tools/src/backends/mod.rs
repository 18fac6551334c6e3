//! Execution backends.
//!
//! An [`ExecutionBackend`] resolves targets and runs diagnostics or shell
//! commands against them. Concrete adapters (local host, fleets behind
//! SSH, vendor APIs) implement this interface; the [`BackendRouter`]
//! multiplexes by target name.

mod demo;
mod local;
mod router;

pub use demo::DemoBackend;
pub use local::LocalBackend;
pub use router::BackendRouter;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured error from a backend operation.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    /// Human-readable description.
    pub message: String,
    /// Machine-readable code (e.g. `"no_backend"`, `"invalid_target"`).
    pub code: String,
}

impl BackendError {
    /// Create an error with the given message and code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
        }
    }
}

/// Result alias for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Describes a single diagnostic action available for a target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticInfo {
    /// Action name (e.g. `"ps"`).
    pub name: String,
    /// What the action does.
    pub description: String,
    /// Kind of target the action applies to (e.g. `"host"`).
    pub target_type: String,
    /// Optional parameter schema for the action.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub parameters: Value,
}

impl DiagnosticInfo {
    /// A parameterless diagnostic.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        target_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            target_type: target_type.into(),
            parameters: Value::Null,
        }
    }
}

/// Options for [`ExecutionBackend::run_shell`].
#[derive(Debug, Clone)]
pub struct ShellOptions {
    /// Hard deadline for the command.
    pub timeout: Duration,
    /// Working directory, when set.
    pub cwd: Option<PathBuf>,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            cwd: None,
        }
    }
}

/// Structured output of a shell command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellOutput {
    /// Process exit code; `-1` when the command timed out or was killed.
    pub exit_code: i32,
    /// Captured standard output (capped).
    pub stdout: String,
    /// Captured standard error (capped).
    pub stderr: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Whether the deadline fired.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
    /// Whether stdout was truncated at the per-stream cap.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stdout_truncated: bool,
    /// Whether stderr was truncated at the per-stream cap.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stderr_truncated: bool,
}

/// Abstract interface for execution backends.
#[async_trait::async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Resolve a target identifier to structured info.
    async fn resolve_target(&self, target: &str) -> BackendResult<Value>;

    /// List available diagnostics for a target.
    async fn list_diagnostics(&self, target: &str) -> BackendResult<Vec<DiagnosticInfo>>;

    /// Run a diagnostic action against a target.
    async fn run_diagnostic(
        &self,
        action: &str,
        target: &str,
        args: &Value,
    ) -> BackendResult<Value>;

    /// Structured shell execution. Backends without a shell keep the
    /// default.
    async fn run_shell(
        &self,
        _command: &str,
        _target: &str,
        _opts: ShellOptions,
    ) -> BackendResult<ShellOutput> {
        Err(BackendError::new(
            "Shell execution not supported by this backend",
            "not_supported",
        ))
    }
}
