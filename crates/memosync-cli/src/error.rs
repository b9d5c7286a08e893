use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] memosync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("User id cannot be empty")]
    EmptyUserId,
    #[error("Invalid snapshot {path}: {message}")]
    InvalidSnapshot { path: String, message: String },
    #[error("Invalid server timestamps: {0}")]
    InvalidServerTimestamps(String),
    #[error("Invalid time '{0}': expected unix milliseconds or RFC 3339")]
    InvalidTime(String),
    #[error("{0} data type(s) failed to sync")]
    SyncIncomplete(usize),
}
