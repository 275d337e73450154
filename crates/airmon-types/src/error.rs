//! Error types for decoding and validating airmon sensor data.

use thiserror::Error;

/// Errors that can occur when decoding sensor frames or building a reading.
///
/// This error type is platform-agnostic and does not include bus or I/O
/// errors (those belong in airmon-core).
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Not enough bytes to decode the frame.
    #[error("Insufficient bytes: expected {expected}, got {actual}")]
    InsufficientBytes { expected: usize, actual: usize },

    /// The frame did not start with the expected marker bytes.
    #[error("Invalid frame header: {0:02X?}")]
    InvalidHeader([u8; 2]),

    /// The frame checksum did not match its contents.
    #[error("Checksum mismatch: frame says {expected:#06X}, computed {computed:#06X}")]
    ChecksumMismatch { expected: u16, computed: u16 },

    /// The sensor reported that it has not finished a measurement.
    #[error("Sensor busy: measurement not ready")]
    NotReady,

    /// A decoded or supplied value violates the reading invariants.
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: f64 },

    /// Any other malformed input.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias using airmon-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
