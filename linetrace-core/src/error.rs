//! Error types for linetrace-core

use thiserror::Error;

/// Main error type for the linetrace-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The storage backend could not answer a query for a metrics scope.
    ///
    /// Kept distinct from an empty result so callers never mistake a
    /// failed query for "no data".
    #[error("storage query failed for {scope}: {message}")]
    Storage { scope: String, message: String },

    /// Rejected input on the recording path
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// `record_after` was called without a staged before-snapshot
    #[error("no before-edit snapshot for session {session_id}, file {file_path}")]
    BeforeEditNotFound {
        session_id: String,
        file_path: String,
    },
}

/// Result type alias for linetrace-core
pub type Result<T> = std::result::Result<T, Error>;
