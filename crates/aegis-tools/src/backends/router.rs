//! Backend router — dispatches calls to the correct backend by target name.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::{
    BackendError, BackendResult, DiagnosticInfo, ExecutionBackend, ShellOptions, ShellOutput,
};

/// Routes calls to the correct backend based on target name.
///
/// Register named backends for specific targets (e.g. `"prod-01"`) and set
/// a default backend for localhost and unrecognized targets. All
/// [`ExecutionBackend`] methods delegate to the resolved backend.
#[derive(Default, Clone)]
pub struct BackendRouter {
    backends: HashMap<String, Arc<dyn ExecutionBackend>>,
    default: Option<Arc<dyn ExecutionBackend>>,
}

impl BackendRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend for a target name.
    pub fn register(&mut self, target: impl Into<String>, backend: Arc<dyn ExecutionBackend>) {
        self.backends.insert(target.into(), backend);
    }

    /// Set the fallback backend (used for localhost and unregistered
    /// targets).
    pub fn set_default(&mut self, backend: Arc<dyn ExecutionBackend>) {
        self.default = Some(backend);
    }

    /// All registered target names.
    pub fn targets(&self) -> Vec<&str> {
        self.backends.keys().map(String::as_str).collect()
    }

    fn resolve(&self, target: &str) -> BackendResult<Arc<dyn ExecutionBackend>> {
        if let Some(backend) = self.backends.get(target) {
            return Ok(backend.clone());
        }
        if let Some(default) = &self.default {
            return Ok(default.clone());
        }
        Err(BackendError::new(
            format!("No backend registered for target: {target}"),
            "no_backend",
        ))
    }
}

#[async_trait::async_trait]
impl ExecutionBackend for BackendRouter {
    async fn resolve_target(&self, target: &str) -> BackendResult<Value> {
        self.resolve(target)?.resolve_target(target).await
    }

    async fn list_diagnostics(&self, target: &str) -> BackendResult<Vec<DiagnosticInfo>> {
        self.resolve(target)?.list_diagnostics(target).await
    }

    async fn run_diagnostic(
        &self,
        action: &str,
        target: &str,
        args: &Value,
    ) -> BackendResult<Value> {
        self.resolve(target)?.run_diagnostic(action, target, args).await
    }

    async fn run_shell(
        &self,
        command: &str,
        target: &str,
        opts: ShellOptions,
    ) -> BackendResult<ShellOutput> {
        self.resolve(target)?.run_shell(command, target, opts).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
