//! Rotating NDJSON audit log.
//!
//! One JSON object per line. Writes are serialized under an engine-scoped
//! mutex; before each write the log rotates if it has reached the size
//! threshold (`log.i -> log.(i+1)` for `i = keep_files-1 .. 1`, then
//! `log -> log.1`). Records are never discarded on rotation — only the
//! oldest file beyond `keep_files` is dropped.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{Value, json};
use tracing::trace;

use aegis_tools::{PrivacyScope, Tool, ToolResult};

use crate::{PolicyEngine, PolicyResult, REDACTED};

/// PUBLIC-scope output is truncated to this many characters.
const PUBLIC_OUTPUT_CHARS: usize = 2000;
/// SENSITIVE-scope output is truncated to this many characters.
const SENSITIVE_OUTPUT_CHARS: usize = 500;

/// Identifiers correlating an audit record with the session event log.
#[derive(Debug, Clone)]
pub struct AuditContext {
    /// Session the call belongs to.
    pub session_id: String,
    /// Event id of the recorded tool call.
    pub event_id: String,
    /// The tool call id from the assistant turn.
    pub tool_call_id: String,
}

impl PolicyEngine {
    /// Append one audit record for an executed (or failed) tool call.
    ///
    /// Arguments and output are shaped by the tool's privacy scope:
    /// PUBLIC logs redacted args and truncated redacted output, SENSITIVE
    /// hides args entirely and truncates output hard, SECRET hides both.
    pub async fn audit_log(
        &self,
        ctx: &AuditContext,
        tool: &dyn Tool,
        arguments: &Value,
        result: &ToolResult,
        duration_ms: u64,
    ) -> PolicyResult<()> {
        let _guard = self.audit_lock.lock().await;

        rotate_if_needed(
            &self.config.audit_log_path,
            self.config.audit_max_size_bytes,
            self.config.audit_keep_files,
        )?;

        let (args, output) = match tool.privacy_scope() {
            PrivacyScope::Public => (
                self.redact_args_for_audit(tool, arguments),
                Value::String(
                    self.redact_output_for_audit(&truncate_chars(
                        &result.content,
                        PUBLIC_OUTPUT_CHARS,
                    )),
                ),
            ),
            PrivacyScope::Sensitive => (
                Value::String(REDACTED.into()),
                Value::String(
                    self.redact_output_for_audit(&truncate_chars(
                        &result.content,
                        SENSITIVE_OUTPUT_CHARS,
                    )),
                ),
            ),
            PrivacyScope::Secret => (
                Value::String(REDACTED.into()),
                Value::String(REDACTED.into()),
            ),
        };

        let record = json!({
            "ts": Utc::now().to_rfc3339(),
            "session_id": ctx.session_id,
            "event_id": ctx.event_id,
            "tool_call_id": ctx.tool_call_id,
            "tool_name": tool.name(),
            "risk": tool.risk_level().as_str(),
            "privacy": tool.privacy_scope().as_str(),
            "duration_ms": duration_ms,
            "success": result.success,
            "error_code": result.error_code.map(|c| c.as_str()),
            "metadata": result.metadata,
            "args": args,
            "output": output,
        });

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.audit_log_path)?;
        let line = serde_json::to_string(&record)?;
        writeln!(file, "{line}")?;
        file.flush()?;

        trace!(tool = tool.name(), "audit record written");
        Ok(())
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Path of the `i`-th rotated file (`audit.jsonl.1`, `audit.jsonl.2`, ...).
fn rotated_path(path: &Path, index: usize) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(format!(".{index}"));
    PathBuf::from(s)
}

fn rotate_if_needed(path: &Path, max_size_bytes: u64, keep_files: usize) -> std::io::Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() >= max_size_bytes => {}
        _ => return Ok(()),
    }

    for i in (1..keep_files).rev() {
        let src = rotated_path(path, i);
        if src.exists() {
            std::fs::rename(&src, rotated_path(path, i + 1))?;
        }
    }
    if keep_files > 0 {
        std::fs::rename(path, rotated_path(path, 1))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
