//! JSON-schema validation of tool arguments.

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::tool::{Tool, normalize_schema};

/// Validate `arguments` against a tool's normalized parameter schema.
///
/// Returns `Err(message)` with the first violation found. A schema that
/// itself fails to compile is reported the same way — the call cannot
/// proceed either way.
pub fn validate(tool: &dyn Tool, arguments: &Value) -> Result<(), String> {
    let schema = normalize_schema(&tool.parameters());
    let compiled =
        JSONSchema::compile(&schema).map_err(|e| format!("invalid tool schema: {e}"))?;

    match compiled.validate(arguments) {
        Ok(()) => Ok(()),
        Err(mut errors) => {
            let message = errors
                .next()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "validation failed".to_owned());
            Err(message)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
