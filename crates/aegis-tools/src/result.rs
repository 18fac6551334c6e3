//! Tool execution results and the shared error-code vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use aegis_store::{ArtifactPayload, ArtifactRef};

/// Discrete failure classification, recorded in `tool_call_result` events
/// and the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Arguments failed JSON-schema validation.
    ValidationError,
    /// The policy engine refused the call.
    PolicyBlock,
    /// The tool exceeded its execution deadline.
    Timeout,
    /// The tool returned an error instead of a result.
    ToolException,
    /// The call named a tool that is not registered.
    UnknownTool,
    /// The user declined confirmation (or the run was cancelled).
    Cancelled,
    /// An execution backend failed inside the tool.
    BackendError,
    /// The provider stream violated the tool-call protocol.
    LlmProtocolError,
}

impl ErrorCode {
    /// The snake_case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::PolicyBlock => "policy_block",
            Self::Timeout => "timeout",
            Self::ToolException => "tool_exception",
            Self::UnknownTool => "unknown_tool",
            Self::Cancelled => "cancelled",
            Self::BackendError => "backend_error",
            Self::LlmProtocolError => "llm_protocol_error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of executing a tool.
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    /// Whether the invocation succeeded.
    pub success: bool,
    /// Human/model-readable result text.
    pub content: String,
    /// Optional structured result data.
    pub data: Option<Value>,
    /// Blobs produced by the tool, waiting to be stored.
    pub artifact_payloads: Vec<ArtifactPayload>,
    /// References to already-stored blobs.
    pub artifacts: Vec<ArtifactRef>,
    /// Error description on failure.
    pub error: Option<String>,
    /// Failure classification on failure.
    pub error_code: Option<ErrorCode>,
    /// Free-form metadata (always a JSON object).
    pub metadata: Value,
}

impl ToolResult {
    /// A successful result with the given content.
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            metadata: Value::Object(Default::default()),
            ..Self::default()
        }
    }

    /// A failed result.
    pub fn failure(content: impl Into<String>, error: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            success: false,
            content: content.into(),
            error: Some(error.into()),
            error_code: Some(code),
            metadata: Value::Object(Default::default()),
            ..Self::default()
        }
    }

    /// Attach structured data.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach an artifact payload to be stored by the orchestrator.
    pub fn with_artifact_payload(mut self, payload: ArtifactPayload) -> Self {
        self.artifact_payloads.push(payload);
        self
    }
}

/// Failure raised by a tool implementation itself.
///
/// The orchestrator maps this to a `tool_exception` result; tools that can
/// classify their own failures should instead return a
/// [`ToolResult::failure`].
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The tool could not complete its work.
    #[error("{0}")]
    Execution(String),

    /// JSON handling inside the tool failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system I/O inside the tool failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for tool execution.
pub type ToolExecResult = std::result::Result<ToolResult, ToolError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
