//! Rolling history and session logging for airmon readings.
//!
//! This crate holds everything the monitor keeps about past readings:
//!
//! - [`HistoryStore`]: an in-memory, time-windowed ring used for the live
//!   chart and the "latest reading" query
//! - [`SessionLogger`]: an append-only CSV file, one per process run
//!
//! Nothing here survives a restart except the CSV files themselves.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use airmon_store::{HistoryStore, SessionLogger, default_log_dir};
//! use time::OffsetDateTime;
//!
//! let history = HistoryStore::new(Duration::from_secs(15 * 60));
//! let logger = SessionLogger::open(default_log_dir(), OffsetDateTime::now_utc())?;
//! # Ok::<(), airmon_store::Error>(())
//! ```

mod error;
mod history;
mod session;

pub use error::{Error, Result};
pub use history::{DEFAULT_WINDOW, HistoryStore};
pub use session::{CSV_HEADER, SessionLogger, session_file_name};

/// Default session log directory following platform conventions.
///
/// - Linux: `~/.local/share/airmon/logs`
/// - macOS: `~/Library/Application Support/airmon/logs`
/// - Windows: `C:\Users\<user>\AppData\Local\airmon\logs`
pub fn default_log_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("airmon")
        .join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_dir_layout() {
        let dir = default_log_dir();
        assert!(dir.ends_with("airmon/logs"));
    }
}
