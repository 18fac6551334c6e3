//! Agent runtime error types.

/// Unified error type for the agent runtime.
///
/// Event-store failures propagate and are fatal to a run; most tool-level
/// failures are not errors at this layer — they become `tool_call_result`
/// events instead.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The event or artifact store failed.
    #[error("store error: {0}")]
    Store(#[from] aegis_store::StoreError),

    /// The LLM router or provider failed.
    #[error("llm error: {0}")]
    Llm(#[from] aegis_llm::LlmError),

    /// An operation needed an active session but none was started.
    #[error("no active session -- call start() or resume() first")]
    NoActiveSession,

    /// `resume` named a session the store does not know.
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },
}

/// Convenience alias used throughout the agent crate.
pub type AgentResult<T> = std::result::Result<T, AgentError>;
