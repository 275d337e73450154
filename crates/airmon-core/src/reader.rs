//! Fused read of both sensors into a [`Reading`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::trace;

use airmon_types::{ParseError, Reading};

use crate::clock::Clock;
use crate::error::{SensorError, SensorFault, SensorKind};
use crate::traits::{ClimateSensor, ParticulateSensor};

/// Default bound on a single sensor read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Composes the particulate and climate sensors into one read capability.
///
/// Both sensors are read concurrently on every cycle, each bounded by the
/// read timeout. A [`Reading`] is only produced when both succeed.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use airmon_core::{Clock, MockClimateSensor, MockParticulateSensor, SensorReader};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let reader = SensorReader::new(
///     Arc::new(MockParticulateSensor::new(2.0, 8.0, 12.0)),
///     Arc::new(MockClimateSensor::new(21.0, 40.0)),
///     Clock::new(),
/// );
/// let reading = reader.read().await.unwrap();
/// assert_eq!(reading.pm2_5(), 8.0);
/// # }
/// ```
#[derive(Clone)]
pub struct SensorReader {
    particulate: Arc<dyn ParticulateSensor>,
    climate: Arc<dyn ClimateSensor>,
    clock: Clock,
    read_timeout: Duration,
}

impl std::fmt::Debug for SensorReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorReader")
            .field("particulate", &self.particulate.name())
            .field("climate", &self.climate.name())
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

impl SensorReader {
    pub fn new(
        particulate: Arc<dyn ParticulateSensor>,
        climate: Arc<dyn ClimateSensor>,
        clock: Clock,
    ) -> Self {
        Self {
            particulate,
            climate,
            clock,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Set the per-sensor read timeout.
    #[must_use]
    pub fn with_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Names of the particulate and climate sensors.
    pub fn sensor_names(&self) -> (&str, &str) {
        (self.particulate.name(), self.climate.name())
    }

    /// Read both sensors and fuse the result.
    ///
    /// The reading is stamped when the cycle starts, so slow sensors do not
    /// shift it. When both sensors fail the particulate error is reported.
    pub async fn read(&self) -> Result<Reading, SensorError> {
        let timestamp = self.clock.now();
        let (particulate, climate) = tokio::join!(
            bounded(self.read_timeout, self.particulate.read_particulate()),
            bounded(self.read_timeout, self.climate.read_climate()),
        );

        let particulate =
            particulate.map_err(|cause| SensorError::new(SensorKind::Particulate, cause))?;
        let climate = climate.map_err(|cause| SensorError::new(SensorKind::Climate, cause))?;

        trace!(?particulate, ?climate, "Sensor read complete");

        Reading::new(timestamp, climate, particulate).map_err(|e| {
            let sensor = match &e {
                ParseError::InvalidValue { field, .. } if field.starts_with("pm") => {
                    SensorKind::Particulate
                }
                _ => SensorKind::Climate,
            };
            SensorError::new(sensor, SensorFault::InvalidData(e))
        })
    }
}

async fn bounded<T>(
    limit: Duration,
    read: impl Future<Output = Result<T, SensorFault>>,
) -> Result<T, SensorFault> {
    match timeout(limit, read).await {
        Ok(result) => result,
        Err(_) => Err(SensorFault::Timeout(limit)),
    }
}
