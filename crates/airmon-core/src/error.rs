//! Error types for airmon-core.
//!
//! Sensor failures are split in two layers:
//!
//! - [`SensorFault`] is what a single capability provider reports (bus I/O,
//!   timeout, malformed frame, unavailable).
//! - [`SensorError`] is what a whole read cycle reports: the fault plus the
//!   [`SensorKind`] that produced it.
//!
//! ## Recovery
//!
//! | Fault | Typical cause | Transient |
//! |-------|---------------|-----------|
//! | [`SensorFault::Bus`] | Bus NAK, loose wiring | yes |
//! | [`SensorFault::Timeout`] | Sensor hung, bus stuck | yes |
//! | [`SensorFault::InvalidData`] | Checksum error, sensor warming up | yes |
//! | [`SensorFault::Unavailable`] | Driver task failed, injected failure | yes |
//!
//! Every sensor fault is treated as transient by the sampler; a persistent
//! outage shows up as a growing consecutive-failure count rather than a
//! different error type.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use embedded_hal::i2c::ErrorKind;
use serde::Serialize;
use thiserror::Error;

use airmon_types::ParseError;

/// Which of the two physical sensors an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// PM1.0 / PM2.5 / PM10 sensor.
    Particulate,
    /// Temperature / humidity sensor.
    Climate,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Particulate => f.write_str("particulate sensor"),
            SensorKind::Climate => f.write_str("climate sensor"),
        }
    }
}

/// Failure reported by a single sensor read.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SensorFault {
    /// Bus-level I²C error.
    #[error("I2C bus error: {0}")]
    Bus(ErrorKind),

    /// The read did not complete within the allowed time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The sensor returned bytes or values that failed validation.
    #[error("invalid data: {0}")]
    InvalidData(#[from] ParseError),

    /// The sensor could not be used at all.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// A failed read cycle.
#[derive(Debug, Error)]
#[error("{sensor} read failed: {cause}")]
pub struct SensorError {
    /// The sensor that failed.
    pub sensor: SensorKind,
    /// What went wrong.
    #[source]
    pub cause: SensorFault,
}

impl SensorError {
    pub fn new(sensor: SensorKind, cause: SensorFault) -> Self {
        Self { sensor, cause }
    }

    /// Whether the failure was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, SensorFault::Timeout(_))
    }
}

/// Errors from setting up sensors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Failed to open an I²C bus.
    #[error("Failed to open I2C bus {path} for address {address:#04x}: {source}")]
    Bus {
        path: PathBuf,
        address: u8,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Sensor initialization did not complete.
    #[error("Failed to initialize {sensor}: {reason}")]
    Init { sensor: SensorKind, reason: String },
}

/// Result type alias using airmon-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_error_display() {
        let err = SensorError::new(
            SensorKind::Particulate,
            SensorFault::Timeout(Duration::from_secs(2)),
        );
        assert_eq!(err.to_string(), "particulate sensor read failed: timed out after 2s");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_sensor_fault_from_parse_error() {
        let fault: SensorFault = ParseError::NotReady.into();
        assert!(matches!(fault, SensorFault::InvalidData(ParseError::NotReady)));
        let err = SensorError::new(SensorKind::Climate, fault);
        assert!(err.to_string().starts_with("climate sensor"));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;

        let err = SensorError::new(
            SensorKind::Climate,
            SensorFault::Bus(ErrorKind::Other),
        );
        let source = err.source().map(|s| s.to_string()).unwrap();
        assert!(source.starts_with("I2C bus error: "));
    }

    #[test]
    fn test_bus_error_display() {
        let err = Error::Bus {
            path: PathBuf::from("/dev/i2c-1"),
            address: 0x12,
            source: std::io::Error::other("denied").into(),
        };
        assert!(err.to_string().contains("/dev/i2c-1"));
        assert!(err.to_string().contains("0x12"));
    }

    #[test]
    fn test_sensor_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SensorKind::Particulate).unwrap(),
            "\"particulate\""
        );
    }
}
