//! Capability traits for the two physical sensors.
//!
//! The sampling core only ever sees these traits; real I²C drivers, mocks and
//! the simulator all implement them.

use async_trait::async_trait;

use airmon_types::{ClimateSample, ParticulateSample};

use crate::error::SensorFault;

/// A source of particulate mass concentrations.
///
/// # Example
///
/// ```ignore
/// use airmon_core::ParticulateSensor;
///
/// async fn print_pm<S: ParticulateSensor>(sensor: &S) {
///     if let Ok(pm) = sensor.read_particulate().await {
///         println!("PM2.5: {} µg/m³", pm.pm2_5);
///     }
/// }
/// ```
#[async_trait]
pub trait ParticulateSensor: Send + Sync {
    /// Short name for logs (e.g. `"PMSA003I"`).
    fn name(&self) -> &str;

    /// Perform one measurement.
    async fn read_particulate(&self) -> Result<ParticulateSample, SensorFault>;
}

/// A source of temperature and relative humidity.
#[async_trait]
pub trait ClimateSensor: Send + Sync {
    /// Short name for logs (e.g. `"AHT20"`).
    fn name(&self) -> &str;

    /// Perform one measurement.
    async fn read_climate(&self) -> Result<ClimateSample, SensorFault>;
}
