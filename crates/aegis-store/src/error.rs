//! Store error types.
//!
//! All storage subsystems surface errors through [`StoreError`].

/// Unified error type for the storage engine.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite returned an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A blocking task failed to join (or a mutex was poisoned).
    #[error("task join error: {0}")]
    TaskJoin(String),

    /// A schema migration failed.
    #[error("migration to version {version} failed: {message}")]
    Migration { version: u32, message: String },

    /// The database was written by a newer version of this crate.
    #[error("database schema version {found} is newer than supported version {supported}")]
    FutureSchema { found: u32, supported: u32 },

    /// The requested session does not exist.
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// The requested artifact does not exist.
    #[error("artifact not found: {sha256}")]
    ArtifactNotFound { sha256: String },

    /// A supplied hash or path resolves outside the artifact base directory.
    #[error("path traversal detected: {path} resolves outside {base}")]
    PathTraversal { path: String, base: String },

    /// A stored event row could not be decoded.
    #[error("malformed event row: {reason}")]
    MalformedEvent { reason: String },

    /// File system I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}

/// Convenience alias used throughout the store crate.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
