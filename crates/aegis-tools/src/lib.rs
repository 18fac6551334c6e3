//! Tool catalog for Aegis.
//!
//! Tools are named, schema-described, risk-tagged actions exposed to the
//! LLM. This crate provides the [`Tool`] trait and [`ToolRegistry`],
//! JSON-schema argument validation, the [`ExecutionBackend`] interface
//! with local/demo implementations and a target router, and the bridge
//! tools that expose backends through the registry.

pub mod backends;
pub mod bridge;
pub mod registry;
pub mod result;
pub mod tool;
pub mod validation;

pub use backends::{
    BackendError, BackendResult, BackendRouter, DemoBackend, DiagnosticInfo, ExecutionBackend,
    LocalBackend, ShellOptions, ShellOutput,
};
pub use bridge::{
    ListDiagnosticsTool, ResolveTargetTool, RunDiagnosticTool, SummarizeArtifactTool,
};
pub use registry::{RegistryError, ToolRegistry};
pub use result::{ErrorCode, ToolError, ToolExecResult, ToolResult};
pub use tool::{PrivacyScope, Tool, ToolRisk, ToolSchema, normalize_schema};
