//! Sensor access and sampling primitives for the airmon air-quality monitor.
//!
//! This crate sits between the raw hardware and the sampling service:
//!
//! - [`ParticulateSensor`] and [`ClimateSensor`]: the two sensor capabilities
//! - [`SensorReader`]: reads both sensors with a timeout and fuses a [`Reading`]
//! - [`Backoff`]: retry delays after failed reads
//! - [`Clock`]: monotonic + wall-clock [`Timestamp`]s
//! - Mock sensors for tests and simulation
//! - I²C drivers for the PMSA003I and AHT20, generic over `embedded-hal`
//!   (i2c-dev constructors on Linux)
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use airmon_core::{Clock, MockClimateSensor, MockParticulateSensor, SensorReader};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = SensorReader::new(
//!     Arc::new(MockParticulateSensor::simulated()),
//!     Arc::new(MockClimateSensor::simulated()),
//!     Clock::new(),
//! )
//! .with_timeout(Duration::from_secs(1));
//!
//! let reading = reader.read().await?;
//! println!("{reading}");
//! # Ok(())
//! # }
//! ```
//!
//! [`Reading`]: airmon_types::Reading
//! [`Timestamp`]: airmon_types::Timestamp

pub mod backoff;
pub mod clock;
pub mod drivers;
pub mod error;
pub mod mock;
pub mod reader;
pub mod traits;

pub use backoff::{Backoff, BackoffConfig};
pub use clock::Clock;
pub use drivers::{AHT20_ADDRESS, AHT20_BUSY_RETRIES, Aht20, PMSA003I_ADDRESS, Pmsa003i};
pub use error::{Error, Result, SensorError, SensorFault, SensorKind};
pub use mock::{MockClimateSensor, MockParticulateSensor};
pub use reader::{DEFAULT_READ_TIMEOUT, SensorReader};
pub use traits::{ClimateSensor, ParticulateSensor};

// Re-export from airmon-types
pub use airmon_types::{AqiCategory, ClimateSample, ParticulateSample, Reading, Timestamp};
