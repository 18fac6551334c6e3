//! The tool abstraction: named, schema-described, risk-tagged actions
//! exposed to the LLM.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::result::ToolExecResult;

// ---------------------------------------------------------------------------
// Risk and privacy taxonomy
// ---------------------------------------------------------------------------

/// How dangerous a tool is. Ordering matters: policy gates on
/// `risk_level > max_risk`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolRisk {
    /// Observes state without changing it.
    ReadOnly = 10,
    /// Creates or modifies resources.
    Write = 20,
    /// Removes or irreversibly alters resources.
    Destructive = 30,
    /// Arbitrary command execution.
    Shell = 40,
}

impl ToolRisk {
    /// The uppercase name used in policy reasons and audit records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "READ_ONLY",
            Self::Write => "WRITE",
            Self::Destructive => "DESTRUCTIVE",
            Self::Shell => "SHELL",
        }
    }
}

impl std::fmt::Display for ToolRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controls how a tool's arguments and output appear in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyScope {
    /// Arguments and output are logged (after pattern redaction).
    Public,
    /// Arguments are fully redacted; output is redacted and truncated hard.
    Sensitive,
    /// Neither arguments nor output are logged.
    Secret,
}

impl PrivacyScope {
    /// The lowercase name used in audit records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Sensitive => "sensitive",
            Self::Secret => "secret",
        }
    }
}

// ---------------------------------------------------------------------------
// Schema normalization
// ---------------------------------------------------------------------------

/// Normalize a tool parameter schema: ensure `type = "object"` and close
/// off extra keys with `additionalProperties = false` unless the tool
/// opted in explicitly.
pub fn normalize_schema(schema: &Value) -> Value {
    let mut normalized = match schema {
        Value::Object(map) => map.clone(),
        _ => Default::default(),
    };
    normalized
        .entry("type")
        .or_insert_with(|| Value::String("object".into()));
    normalized
        .entry("additionalProperties")
        .or_insert(Value::Bool(false));
    Value::Object(normalized)
}

// ---------------------------------------------------------------------------
// Tool trait
// ---------------------------------------------------------------------------

/// A named, schema-described, risk-tagged action exposed to the LLM.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments.
    fn parameters(&self) -> Value;

    /// How dangerous this tool is.
    fn risk_level(&self) -> ToolRisk {
        ToolRisk::ReadOnly
    }

    /// How this tool's arguments and output appear in the audit log.
    fn privacy_scope(&self) -> PrivacyScope {
        PrivacyScope::Public
    }

    /// Argument names whose values are always redacted in the audit log.
    fn secret_fields(&self) -> Vec<String> {
        Vec::new()
    }

    /// Execute the tool.
    ///
    /// An `Err` is treated as an uncaught tool failure
    /// (`tool_exception`); classified failures should come back as
    /// `Ok(ToolResult::failure(...))`.
    async fn execute(&self, arguments: Value) -> ToolExecResult;
}

/// One entry of the exported tool catalog, as handed to providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Normalized JSON Schema for the arguments.
    pub parameters: Value,
}

impl ToolSchema {
    /// Build the catalog record for a tool, normalizing its schema.
    pub fn for_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_owned(),
            description: tool.description().to_owned(),
            parameters: normalize_schema(&tool.parameters()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
