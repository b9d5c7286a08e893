//! Error types for memosync-core

use thiserror::Error;

use crate::models::DataType;

/// Result type alias using memosync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in memosync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local key-value store error
    #[error("Store error: {0}")]
    Store(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote document store error
    #[error("Remote store error: {0}")]
    Remote(String),

    /// A reconciliation cycle for this data type is already running
    #[error("Sync cycle already in progress for {0}")]
    CycleInProgress(DataType),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
