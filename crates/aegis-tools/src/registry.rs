//! Named tool catalog.
//!
//! The registry supports `register` with an overwrite gate, but the
//! orchestrator treats it as frozen for the duration of a run.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::tool::{Tool, ToolRisk, ToolSchema};

/// Error raised by registry mutation.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A tool with this name exists and `overwrite` was not set.
    #[error("tool already registered: {name}")]
    AlreadyRegistered { name: String },
}

/// Named catalog of [`Tool`]s.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Duplicate names are rejected unless `overwrite`.
    pub fn register(&mut self, tool: Arc<dyn Tool>, overwrite: bool) -> Result<(), RegistryError> {
        let name = tool.name().to_owned();
        if self.tools.contains_key(&name) && !overwrite {
            return Err(RegistryError::AlreadyRegistered { name });
        }
        debug!(tool = %name, risk = %tool.risk_level(), "tool registered");
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List tools sorted by name, optionally filtered to `risk <= max_risk`.
    pub fn list(&self, max_risk: Option<ToolRisk>) -> Vec<Arc<dyn Tool>> {
        let mut tools: Vec<Arc<dyn Tool>> = self
            .tools
            .values()
            .filter(|t| max_risk.is_none_or(|max| t.risk_level() <= max))
            .cloned()
            .collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    /// Export the catalog as normalized `{name, description, parameters}`
    /// records.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.list(None)
            .iter()
            .map(|t| ToolSchema::for_tool(t.as_ref()))
            .collect()
    }

    /// The catalog as plain JSON values, ready to hand to a provider.
    pub fn schema_values(&self) -> Vec<Value> {
        self.schemas()
            .iter()
            .filter_map(|s| serde_json::to_value(s).ok())
            .collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{ToolExecResult, ToolResult};
    use serde_json::json;

    struct NamedTool {
        name: &'static str,
        risk: ToolRisk,
    }

    #[async_trait::async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "a test tool"
        }
        fn parameters(&self) -> Value {
            json!({"properties": {}})
        }
        fn risk_level(&self) -> ToolRisk {
            self.risk
        }
        async fn execute(&self, _arguments: Value) -> ToolExecResult {
            Ok(ToolResult::ok("done"))
        }
    }

    fn tool(name: &'static str, risk: ToolRisk) -> Arc<dyn Tool> {
        Arc::new(NamedTool { name, risk })
    }

    #[test]
    fn register_and_get() {
        let mut reg = ToolRegistry::new();
        reg.register(tool("echo", ToolRisk::ReadOnly), false).unwrap();
        assert!(reg.get("echo").is_some());
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn duplicate_registration_rejected_without_overwrite() {
        let mut reg = ToolRegistry::new();
        reg.register(tool("echo", ToolRisk::ReadOnly), false).unwrap();

        let err = reg
            .register(tool("echo", ToolRisk::Write), false)
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered { .. }));

        reg.register(tool("echo", ToolRisk::Write), true).unwrap();
        assert_eq!(reg.get("echo").unwrap().risk_level(), ToolRisk::Write);
    }

    #[test]
    fn list_sorted_and_filtered_by_risk() {
        let mut reg = ToolRegistry::new();
        reg.register(tool("zeta", ToolRisk::Shell), false).unwrap();
        reg.register(tool("alpha", ToolRisk::ReadOnly), false).unwrap();
        reg.register(tool("mid", ToolRisk::Write), false).unwrap();

        let all = reg.list(None);
        let names: Vec<_> = all.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);

        let safe = reg.list(Some(ToolRisk::Write));
        let names: Vec<_> = safe.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["alpha", "mid"]);
    }

    #[test]
    fn schemas_are_normalized() {
        let mut reg = ToolRegistry::new();
        reg.register(tool("echo", ToolRisk::ReadOnly), false).unwrap();

        let schemas = reg.schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "echo");
        assert_eq!(schemas[0].parameters["type"], "object");
        assert_eq!(schemas[0].parameters["additionalProperties"], false);
    }
}
