//! Policy engine for Aegis.
//!
//! Every tool call passes through [`PolicyEngine::check`] before
//! execution: a risk ceiling, blocked-argument patterns, and per-risk
//! confirmation gates. Executed calls are recorded through the rotating
//! NDJSON audit log in [`audit`], with arguments and output shaped by the
//! tool's privacy scope.

pub mod audit;

use regex::Regex;
use serde_json::Value;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

use aegis_tools::{Tool, ToolRisk};

pub use audit::AuditContext;

const REDACTED: &str = "***REDACTED***";

/// Policy engine errors.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// A blocked or redaction pattern failed to compile.
    #[error("invalid policy pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Audit log I/O failed.
    #[error("audit io error: {0}")]
    Io(#[from] std::io::Error),

    /// Audit record serialization failed.
    #[error("audit json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for policy operations.
pub type PolicyResult<T> = std::result::Result<T, PolicyError>;

/// The outcome of a policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    /// Whether the call may proceed at all.
    pub allowed: bool,
    /// Why (`ok`, `requires_confirmation`, `blocked_pattern`,
    /// `risk_too_high:<LEVEL>><MAX>`).
    pub reason: String,
    /// Whether the user must confirm before execution.
    pub requires_confirmation: bool,
}

impl PolicyDecision {
    fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            requires_confirmation: false,
        }
    }
}

/// Construction parameters for [`PolicyEngine`].
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Highest tool risk that may execute.
    pub max_risk: ToolRisk,
    /// Gate DESTRUCTIVE tools behind confirmation.
    pub confirm_destructive: bool,
    /// Gate SHELL tools behind confirmation.
    pub confirm_shell: bool,
    /// Gate WRITE tools behind confirmation.
    pub confirm_write: bool,
    /// Regexes that block a call when they match the canonical argument
    /// JSON.
    pub blocked_patterns: Vec<String>,
    /// Regexes whose matches are replaced in audited arguments/output.
    pub redaction_patterns: Vec<String>,
    /// Path of the primary audit log file.
    pub audit_log_path: PathBuf,
    /// Rotate when the log file reaches this size.
    pub audit_max_size_bytes: u64,
    /// Number of rotated files to keep.
    pub audit_keep_files: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_risk: ToolRisk::ReadOnly,
            confirm_destructive: true,
            confirm_shell: true,
            confirm_write: false,
            blocked_patterns: Vec::new(),
            redaction_patterns: Vec::new(),
            audit_log_path: PathBuf::from("audit.jsonl"),
            audit_max_size_bytes: 10 * 1024 * 1024,
            audit_keep_files: 5,
        }
    }
}

/// Risk gating, confirmation gating, redaction and audit logging.
pub struct PolicyEngine {
    config: PolicyConfig,
    blocked: Vec<Regex>,
    redaction: Vec<Regex>,
    // Serializes audit writes and rotation.
    audit_lock: Mutex<()>,
}

impl PolicyEngine {
    /// Build an engine, compiling its patterns and creating the audit log
    /// directory.
    pub fn new(config: PolicyConfig) -> PolicyResult<Self> {
        let blocked = config
            .blocked_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let redaction = config
            .redaction_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(parent) = config.audit_log_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            config,
            blocked,
            redaction,
            audit_lock: Mutex::new(()),
        })
    }

    /// The engine's configuration.
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Checking
    // ------------------------------------------------------------------

    /// Evaluate whether a tool call may proceed.
    pub fn check(&self, tool: &dyn Tool, arguments: &Value) -> PolicyDecision {
        let risk = tool.risk_level();

        if risk > self.config.max_risk {
            let decision = PolicyDecision::denied(format!(
                "risk_too_high:{}>{}",
                risk.as_str(),
                self.config.max_risk.as_str()
            ));
            debug!(tool = tool.name(), reason = %decision.reason, "tool blocked");
            return decision;
        }

        if !self.blocked.is_empty() {
            // serde_json objects are keyed by BTreeMap, so this is the
            // canonical sorted-key form.
            let blob = arguments.to_string();
            if self.blocked.iter().any(|rx| rx.is_match(&blob)) {
                debug!(tool = tool.name(), "tool blocked by argument pattern");
                return PolicyDecision::denied("blocked_pattern");
            }
        }

        let requires_confirmation = (risk >= ToolRisk::Shell && self.config.confirm_shell)
            || (risk >= ToolRisk::Destructive && self.config.confirm_destructive)
            || (risk >= ToolRisk::Write && self.config.confirm_write);

        PolicyDecision {
            allowed: true,
            reason: if requires_confirmation {
                "requires_confirmation".into()
            } else {
                "ok".into()
            },
            requires_confirmation,
        }
    }

    // ------------------------------------------------------------------
    // Redaction
    // ------------------------------------------------------------------

    /// Redact arguments for the audit log: secret fields first, then
    /// pattern redaction over the remaining string values.
    pub fn redact_args_for_audit(&self, tool: &dyn Tool, arguments: &Value) -> Value {
        let Value::Object(map) = arguments else {
            return arguments.clone();
        };

        let secret_fields = tool.secret_fields();
        let mut redacted = map.clone();
        for (key, value) in redacted.iter_mut() {
            if secret_fields.iter().any(|f| f == key) {
                *value = Value::String(REDACTED.into());
            } else if let Value::String(s) = value {
                *value = Value::String(self.apply_pattern_redaction(s));
            }
        }
        Value::Object(redacted)
    }

    /// Redact tool output for the audit log.
    pub fn redact_output_for_audit(&self, text: &str) -> String {
        self.apply_pattern_redaction(text)
    }

    fn apply_pattern_redaction(&self, text: &str) -> String {
        let mut out = text.to_owned();
        for rx in &self.redaction {
            out = rx.replace_all(&out, REDACTED).into_owned();
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_tools::{PrivacyScope, ToolExecResult, ToolResult};
    use serde_json::json;

    pub(crate) struct FakeTool {
        pub name: &'static str,
        pub risk: ToolRisk,
        pub privacy: PrivacyScope,
        pub secrets: Vec<String>,
    }

    impl FakeTool {
        pub fn read_only() -> Self {
            Self {
                name: "echo",
                risk: ToolRisk::ReadOnly,
                privacy: PrivacyScope::Public,
                secrets: Vec::new(),
            }
        }

        pub fn with_risk(risk: ToolRisk) -> Self {
            Self {
                risk,
                ..Self::read_only()
            }
        }
    }

    #[async_trait::async_trait]
    impl Tool for FakeTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "a fake tool"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        fn risk_level(&self) -> ToolRisk {
            self.risk
        }
        fn privacy_scope(&self) -> PrivacyScope {
            self.privacy
        }
        fn secret_fields(&self) -> Vec<String> {
            self.secrets.clone()
        }
        async fn execute(&self, _arguments: Value) -> ToolExecResult {
            Ok(ToolResult::ok(""))
        }
    }

    fn engine(config: PolicyConfig) -> PolicyEngine {
        PolicyEngine::new(config).unwrap()
    }

    fn tmp_config(dir: &tempfile::TempDir) -> PolicyConfig {
        PolicyConfig {
            audit_log_path: dir.path().join("audit.jsonl"),
            ..Default::default()
        }
    }

    #[test]
    fn risk_above_ceiling_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(tmp_config(&dir));

        let decision = engine.check(&FakeTool::with_risk(ToolRisk::Write), &json!({}));
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "risk_too_high:WRITE>READ_ONLY");
    }

    #[test]
    fn risk_at_ceiling_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(PolicyConfig {
            max_risk: ToolRisk::Shell,
            confirm_shell: false,
            confirm_destructive: false,
            ..tmp_config(&dir)
        });

        let decision = engine.check(&FakeTool::with_risk(ToolRisk::Shell), &json!({}));
        assert!(decision.allowed);
        assert!(!decision.requires_confirmation);
        assert_eq!(decision.reason, "ok");
    }

    #[test]
    fn blocked_pattern_denies() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(PolicyConfig {
            blocked_patterns: vec![r"rm\s+-rf".into()],
            max_risk: ToolRisk::Shell,
            ..tmp_config(&dir)
        });

        let decision = engine.check(
            &FakeTool::read_only(),
            &json!({"command": "rm -rf /tmp/x"}),
        );
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "blocked_pattern");

        let decision = engine.check(&FakeTool::read_only(), &json!({"command": "ls"}));
        assert!(decision.allowed);
    }

    #[test]
    fn confirmation_flags_gate_by_risk() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(PolicyConfig {
            max_risk: ToolRisk::Shell,
            confirm_shell: true,
            confirm_destructive: true,
            confirm_write: false,
            ..tmp_config(&dir)
        });

        let shell = engine.check(&FakeTool::with_risk(ToolRisk::Shell), &json!({}));
        assert!(shell.allowed && shell.requires_confirmation);
        assert_eq!(shell.reason, "requires_confirmation");

        let destructive = engine.check(&FakeTool::with_risk(ToolRisk::Destructive), &json!({}));
        assert!(destructive.requires_confirmation);

        let write = engine.check(&FakeTool::with_risk(ToolRisk::Write), &json!({}));
        assert!(!write.requires_confirmation);

        let read = engine.check(&FakeTool::with_risk(ToolRisk::ReadOnly), &json!({}));
        assert!(!read.requires_confirmation);
    }

    #[test]
    fn confirm_write_extends_to_write_tools() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(PolicyConfig {
            max_risk: ToolRisk::Shell,
            confirm_write: true,
            ..tmp_config(&dir)
        });

        let write = engine.check(&FakeTool::with_risk(ToolRisk::Write), &json!({}));
        assert!(write.requires_confirmation);
    }

    #[test]
    fn secret_fields_redacted_before_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(PolicyConfig {
            redaction_patterns: vec![r"secret-\d+".into()],
            ..tmp_config(&dir)
        });

        let tool = FakeTool {
            secrets: vec!["password".into()],
            ..FakeTool::read_only()
        };
        let redacted = engine.redact_args_for_audit(
            &tool,
            &json!({
                "password": "hunter2",
                "note": "token secret-123 inline",
                "count": 7,
            }),
        );

        assert_eq!(redacted["password"], REDACTED);
        assert_eq!(redacted["note"], format!("token {REDACTED} inline"));
        assert_eq!(redacted["count"], 7);
    }

    #[test]
    fn output_redaction_applies_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(PolicyConfig {
            redaction_patterns: vec![r"api_key=\w+".into()],
            ..tmp_config(&dir)
        });

        let out = engine.redact_output_for_audit("before api_key=abc123 after");
        assert_eq!(out, format!("before {REDACTED} after"));
    }

    #[test]
    fn invalid_pattern_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let err = PolicyEngine::new(PolicyConfig {
            blocked_patterns: vec!["(unclosed".into()],
            ..tmp_config(&dir)
        });
        assert!(matches!(err, Err(PolicyError::Pattern(_))));
    }
}
