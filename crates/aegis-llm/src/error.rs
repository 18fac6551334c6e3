//! LLM subsystem error types.

/// Unified error type for providers and the router.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// An HTTP request to the provider failed.
    #[error("llm request failed: {reason}")]
    RequestFailed { reason: String },

    /// The provider response could not be parsed into the expected format.
    #[error("llm response parse error: {reason}")]
    ParseFailed { reason: String },

    /// The streaming connection was interrupted or produced invalid data.
    #[error("llm stream error: {reason}")]
    StreamError { reason: String },

    /// `set_active` named a provider that was never registered.
    #[error("unknown provider: {name}")]
    UnknownProvider { name: String },

    /// A chat was requested before any provider was registered.
    #[error("no active llm provider")]
    NoActiveProvider,

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed {
            reason: err.to_string(),
        }
    }
}

/// Convenience alias used throughout the llm crate.
pub type LlmResult<T> = std::result::Result<T, LlmError>;
