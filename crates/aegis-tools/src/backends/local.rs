//! Local shell execution backend.

use std::process::Stdio;
use std::time::Instant;

use serde_json::{Value, json};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

use super::{
    BackendError, BackendResult, DiagnosticInfo, ExecutionBackend, ShellOptions, ShellOutput,
};

/// Cap output per stream to prevent memory issues.
const MAX_OUTPUT_BYTES: usize = 100 * 1024;

const LOCAL_TARGETS: &[&str] = &["localhost", "local", "127.0.0.1"];

/// Execution backend that runs commands on the local machine.
#[derive(Debug, Clone, Default)]
pub struct LocalBackend;

impl LocalBackend {
    /// Create a local backend.
    pub fn new() -> Self {
        Self
    }

    fn check_target(target: &str) -> BackendResult<()> {
        if LOCAL_TARGETS.contains(&target) {
            Ok(())
        } else {
            Err(BackendError::new(
                format!("LocalBackend only supports localhost, got: {target}"),
                "invalid_target",
            ))
        }
    }

    fn diagnostic_command(action: &str) -> Option<&'static str> {
        match action {
            "ps" => Some("ps aux --sort=-%mem | head -20"),
            "df" => Some("df -h"),
            "uptime" => Some("uptime"),
            "free" => Some("free -h"),
            "uname" => Some("uname -a"),
            "who" => Some("who"),
            _ => None,
        }
    }
}

#[async_trait::async_trait]
impl ExecutionBackend for LocalBackend {
    async fn resolve_target(&self, target: &str) -> BackendResult<Value> {
        Self::check_target(target)?;

        let hostname = std::env::var("HOSTNAME")
            .ok()
            .or_else(|| {
                std::fs::read_to_string("/etc/hostname")
                    .ok()
                    .map(|s| s.trim().to_owned())
            })
            .unwrap_or_else(|| "localhost".to_owned());

        Ok(json!({
            "type": "host",
            "hostname": hostname,
            "platform": std::env::consts::OS,
            "architecture": std::env::consts::ARCH,
        }))
    }

    async fn list_diagnostics(&self, target: &str) -> BackendResult<Vec<DiagnosticInfo>> {
        Self::check_target(target)?;
        Ok(vec![
            DiagnosticInfo::new("shell", "Execute an arbitrary shell command", "host"),
            DiagnosticInfo::new("ps", "List running processes", "host"),
            DiagnosticInfo::new("df", "Show disk usage", "host"),
            DiagnosticInfo::new("uptime", "Show system uptime and load", "host"),
            DiagnosticInfo::new("free", "Show memory usage", "host"),
            DiagnosticInfo::new("uname", "Show system information", "host"),
            DiagnosticInfo::new("who", "Show logged-in users", "host"),
        ])
    }

    async fn run_diagnostic(
        &self,
        action: &str,
        target: &str,
        _args: &Value,
    ) -> BackendResult<Value> {
        let command = Self::diagnostic_command(action).ok_or_else(|| {
            BackendError::new(
                format!("Unknown diagnostic action: {action}"),
                "unknown_diagnostic",
            )
        })?;

        let output = self
            .run_shell(command, target, ShellOptions::default())
            .await?;
        serde_json::to_value(&output)
            .map_err(|e| BackendError::new(format!("serialize failed: {e}"), "internal"))
    }

    async fn run_shell(
        &self,
        command: &str,
        target: &str,
        opts: ShellOptions,
    ) -> BackendResult<ShellOutput> {
        Self::check_target(target)?;

        let started = Instant::now();

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &opts.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| BackendError::new(format!("failed to spawn: {e}"), "spawn_failed"))?;

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let collect = async {
            let mut stdout_raw = Vec::new();
            let mut stderr_raw = Vec::new();
            // Drain both pipes concurrently so a full stderr buffer cannot
            // stall a child that we are only reading stdout from.
            tokio::join!(
                async {
                    if let Some(out) = stdout_pipe.as_mut() {
                        let _ = out.read_to_end(&mut stdout_raw).await;
                    }
                },
                async {
                    if let Some(err) = stderr_pipe.as_mut() {
                        let _ = err.read_to_end(&mut stderr_raw).await;
                    }
                },
            );
            let status = child.wait().await;
            (status, stdout_raw, stderr_raw)
        };

        match tokio::time::timeout(opts.timeout, collect).await {
            Ok((status, stdout_raw, stderr_raw)) => {
                let status = status.map_err(|e| {
                    BackendError::new(format!("wait failed: {e}"), "wait_failed")
                })?;
                let duration_ms = started.elapsed().as_millis() as u64;
                let (stdout, stdout_truncated) = cap_stream(&stdout_raw);
                let (stderr, stderr_truncated) = cap_stream(&stderr_raw);

                debug!(
                    exit_code = status.code().unwrap_or(-1),
                    duration_ms, "shell command finished"
                );

                Ok(ShellOutput {
                    exit_code: status.code().unwrap_or(-1),
                    stdout,
                    stderr,
                    duration_ms,
                    timed_out: false,
                    stdout_truncated,
                    stderr_truncated,
                })
            }
            Err(_) => {
                // Deadline fired: kill the child so nothing leaks.
                let _ = child.start_kill();
                let _ = child.wait().await;
                let duration_ms = started.elapsed().as_millis() as u64;

                Ok(ShellOutput {
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: format!("Command timed out after {:?}", opts.timeout),
                    duration_ms,
                    timed_out: true,
                    stdout_truncated: false,
                    stderr_truncated: false,
                })
            }
        }
    }
}

fn cap_stream(raw: &[u8]) -> (String, bool) {
    let truncated = raw.len() > MAX_OUTPUT_BYTES;
    let capped = if truncated {
        &raw[..MAX_OUTPUT_BYTES]
    } else {
        raw
    };
    (String::from_utf8_lossy(capped).into_owned(), truncated)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
