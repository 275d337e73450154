//! Error types for airmon-store.

use std::path::PathBuf;
use std::time::Duration;

/// Result type for airmon-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in airmon-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A reading was not newer than the current tail of the history.
    #[error("Reading at {attempted:?} is not after the latest reading at {latest:?}")]
    OutOfOrder {
        latest: Duration,
        attempted: Duration,
    },

    /// Failed to create the log directory.
    #[error("Failed to create log directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to open the session log file.
    #[error("Failed to open session log {path}: {source}")]
    OpenLog {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid timestamp.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// CSV encoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
