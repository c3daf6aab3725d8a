//! Error types for darts core operations.
//!
//! The persistence layer itself never raises: per-statement failures are logged
//! and turned into "no data" results. These errors cover the setup paths around
//! it (opening handles, copying and swapping database directories, reading
//! rows into typed values). The CLI maps them to user-facing messages.

use thiserror::Error;

/// Result type alias for darts core operations.
pub type Result<T> = std::result::Result<T, DartsError>;

/// Core error type for darts operations.
#[derive(Debug, Error)]
pub enum DartsError {
    /// SQLite or connection pool error
    #[error("Database error: {0}")]
    Database(String),

    /// A column value did not match the type its descriptor declares
    #[error("Type error: {0}")]
    Type(String),

    /// Filesystem error while copying or swapping database files
    #[error("Storage error: {0}")]
    Storage(String),

    /// Schema version could not be brought up to date
    #[error("Migration error: {0}")]
    Migration(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<std::io::Error> for DartsError {
    fn from(err: std::io::Error) -> Self {
        DartsError::Storage(err.to_string())
    }
}

impl From<rusqlite::Error> for DartsError {
    fn from(err: rusqlite::Error) -> Self {
        DartsError::Database(err.to_string())
    }
}

impl From<r2d2::Error> for DartsError {
    fn from(err: r2d2::Error) -> Self {
        DartsError::Database(format!("Connection pool error: {}", err))
    }
}

impl From<serde_json::Error> for DartsError {
    fn from(err: serde_json::Error) -> Self {
        DartsError::Storage(err.to_string())
    }
}
