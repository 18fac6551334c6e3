//! Agent runtime for Aegis.
//!
//! The [`Orchestrator`] drives the multi-turn loop of streamed
//! tool-calling: it packs session history into a token budget via the
//! [`ContextPacker`], streams the LLM through the router, and executes
//! each assembled tool call through validation, policy, confirmation,
//! execution, artifact persistence and audit. The [`Session`] façade
//! derives the LLM-visible message view from the durable event log.

pub mod context;
pub mod error;
pub mod orchestrator;
pub mod session;

pub use context::{ContextPackReport, ContextPacker};
pub use error::{AgentError, AgentResult};
pub use orchestrator::{ConfirmationCallback, Orchestrator, OrchestratorConfig};
pub use session::Session;
