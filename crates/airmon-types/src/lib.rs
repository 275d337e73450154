//! Platform-agnostic types for the airmon air-quality monitor.
//!
//! This crate provides the data model shared by the sampling core, the
//! session log and the HTTP API:
//!
//! - [`Reading`]: one fused particulate + climate sample with its category
//! - [`AqiCategory`] and [`classify`]: PM2.5/PM10 breakpoint classification
//! - Frame decoders for the PMSA003I and AHT20 sensors
//! - [`ParseError`] for decoding and validation failures
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use airmon_types::{ClimateSample, ParticulateSample, Reading, Timestamp};
//! use time::OffsetDateTime;
//!
//! let reading = Reading::new(
//!     Timestamp::new(OffsetDateTime::now_utc(), Duration::ZERO),
//!     ClimateSample::new(22.5, 41.0),
//!     ParticulateSample::new(2.0, 8.0, 12.0),
//! )?;
//! println!("{reading}");
//! # Ok::<(), airmon_types::ParseError>(())
//! ```

pub mod aqi;
pub mod error;
pub mod types;

pub use aqi::{AqiCategory, classify, classify_pm10, classify_pm25};
pub use error::{ParseError, ParseResult};
pub use types::{
    ClimateSample, ParticulateSample, Reading, Timestamp, aht20_crc8, celsius_to_fahrenheit,
};
