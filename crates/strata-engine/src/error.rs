// crates/strata-engine/src/error.rs
// Standardized error types for Strata

use thiserror::Error;

/// Main error type for the Strata library
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown project: {0}")]
    UnknownProject(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("data fetch failed: {0}")]
    Fetch(String),

    #[error("run exceeded its {0}s budget")]
    Timeout(u64),

    #[error("task cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown error: {0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Convenience type alias for Result using StrataError
pub type Result<T> = std::result::Result<T, StrataError>;

impl From<String> for StrataError {
    fn from(s: String) -> Self {
        StrataError::Other(s)
    }
}

impl From<tokio::task::JoinError> for StrataError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            StrataError::Cancelled
        } else {
            StrataError::Other(err.to_string())
        }
    }
}

impl From<StrataError> for String {
    fn from(err: StrataError) -> Self {
        err.to_string()
    }
}
