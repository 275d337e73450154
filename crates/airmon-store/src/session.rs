//! Per-session CSV log of successful readings.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info, warn};

use airmon_types::Reading;

use crate::error::{Error, Result};

/// Column order of every session log.
pub const CSV_HEADER: [&str; 8] = [
    "time_iso",
    "temp_c",
    "temp_f",
    "humidity",
    "pm1",
    "pm25",
    "pm10",
    "aqi_category",
];

/// One CSV row. Field order and names match [`CSV_HEADER`].
#[derive(Debug, Serialize)]
struct LogRow {
    time_iso: String,
    temp_c: String,
    temp_f: String,
    humidity: String,
    pm1: String,
    pm25: String,
    pm10: String,
    aqi_category: &'static str,
}

impl From<&Reading> for LogRow {
    fn from(reading: &Reading) -> Self {
        Self {
            time_iso: reading.timestamp().iso_seconds(),
            temp_c: format!("{:.1}", reading.temperature_c()),
            temp_f: format!("{:.1}", reading.temperature_f()),
            humidity: format!("{:.1}", reading.humidity()),
            pm1: format!("{:.1}", reading.pm1_0()),
            pm25: format!("{:.1}", reading.pm2_5()),
            pm10: format!("{:.1}", reading.pm10()),
            aqi_category: reading.aqi_category().label(),
        }
    }
}

/// File name of the session log started at `started_at`
/// (`session-YYYYMMDD-HHMMSS.csv`, UTC).
pub fn session_file_name(started_at: OffsetDateTime) -> Result<String> {
    let format = time::format_description::parse("[year][month][day]-[hour][minute][second]")
        .map_err(|e| Error::InvalidTimestamp(e.to_string()))?;
    let stamp = started_at
        .to_offset(UtcOffset::UTC)
        .format(&format)
        .map_err(|e| Error::InvalidTimestamp(e.to_string()))?;
    Ok(format!("session-{stamp}.csv"))
}

/// Append-only CSV writer for one process lifetime.
///
/// The header is written only when the file is empty, so reopening an
/// existing session file never duplicates it. Every row is flushed before
/// [`append`](Self::append) returns.
///
/// # Example
///
/// ```no_run
/// use airmon_store::SessionLogger;
/// use time::OffsetDateTime;
///
/// let logger = SessionLogger::open("/var/log/airmon", OffsetDateTime::now_utc())?;
/// println!("logging to {}", logger.path().display());
/// logger.close()?;
/// # Ok::<(), airmon_store::Error>(())
/// ```
pub struct SessionLogger {
    writer: csv::Writer<Box<dyn Write + Send>>,
    path: PathBuf,
    rows_written: u64,
}

impl fmt::Debug for SessionLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLogger")
            .field("path", &self.path)
            .field("rows_written", &self.rows_written)
            .finish_non_exhaustive()
    }
}

impl SessionLogger {
    /// Open (or create) the session log for `started_at` under `dir`.
    ///
    /// `dir` is created if it does not exist.
    pub fn open(dir: impl AsRef<Path>, started_at: OffsetDateTime) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| Error::CreateDirectory {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        let path = dir.join(session_file_name(started_at)?);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::OpenLog {
                path: path.clone(),
                source: e,
            })?;
        let is_new = file.metadata()?.len() == 0;

        let logger = Self::with_writer(Box::new(file), path, is_new)?;
        info!("Session log at {}", logger.path.display());
        Ok(logger)
    }

    /// Log to an arbitrary sink, reported as `path`.
    ///
    /// The header is written immediately.
    pub fn from_writer(
        writer: impl Write + Send + 'static,
        path: impl Into<PathBuf>,
    ) -> Result<Self> {
        Self::with_writer(Box::new(writer), path.into(), true)
    }

    fn with_writer(sink: Box<dyn Write + Send>, path: PathBuf, header: bool) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(sink);
        if header {
            writer.write_record(CSV_HEADER)?;
            writer.flush()?;
        }
        Ok(Self {
            writer,
            path,
            rows_written: 0,
        })
    }

    /// Append one row and flush it.
    pub fn append(&mut self, reading: &Reading) -> Result<()> {
        self.writer.serialize(LogRow::from(reading))?;
        self.writer.flush()?;
        self.rows_written += 1;
        debug!(rows = self.rows_written, "Logged reading");
        Ok(())
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended by this logger.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flush and release the file.
    pub fn close(mut self) -> Result<()> {
        self.writer.flush()?;
        info!(
            rows = self.rows_written,
            "Closed session log {}",
            self.path.display()
        );
        Ok(())
    }
}

impl Drop for SessionLogger {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!("Failed to flush session log {}: {}", self.path.display(), e);
        }
    }
}
