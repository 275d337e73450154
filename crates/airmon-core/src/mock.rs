//! Mock sensors for testing and hardware-free runs.
//!
//! [`MockParticulateSensor`] and [`MockClimateSensor`] implement the sensor
//! traits with fixed values that tests can change at any time.
//!
//! # Features
//!
//! - **Failure injection**: fail every read, or only the next N reads
//! - **Latency simulation**: delay reads to exercise timeouts
//! - **Noise**: add bounded random variation, used by the simulator

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::RwLock;

use airmon_types::{ClimateSample, ParticulateSample};

use crate::error::SensorFault;
use crate::traits::{ClimateSensor, ParticulateSensor};

/// Failure and latency knobs shared by both mocks.
#[derive(Debug)]
struct FaultInjector {
    should_fail: AtomicBool,
    remaining_failures: AtomicU32,
    latency_ms: AtomicU64,
    read_count: AtomicU32,
    fail_message: RwLock<String>,
}

impl FaultInjector {
    fn new() -> Self {
        Self {
            should_fail: AtomicBool::new(false),
            remaining_failures: AtomicU32::new(0),
            latency_ms: AtomicU64::new(0),
            read_count: AtomicU32::new(0),
            fail_message: RwLock::new("Mock failure".to_string()),
        }
    }

    /// Count the read, apply latency, then decide whether it fails.
    async fn begin_read(&self) -> Result<(), SensorFault> {
        self.read_count.fetch_add(1, Ordering::Relaxed);

        let latency = self.latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let transient = self
            .remaining_failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();

        if transient || self.should_fail.load(Ordering::Relaxed) {
            let message = self.fail_message.read().await.clone();
            return Err(SensorFault::Unavailable(message));
        }
        Ok(())
    }
}

fn jitter(value: f64, amplitude: f64) -> f64 {
    if amplitude <= 0.0 {
        return value;
    }
    value + rand::rng().random_range(-amplitude..=amplitude)
}

/// A mock particulate sensor.
///
/// # Example
///
/// ```
/// use airmon_core::{MockParticulateSensor, ParticulateSensor};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let sensor = MockParticulateSensor::new(1.0, 5.0, 9.0);
/// sensor.fail_next(1);
/// assert!(sensor.read_particulate().await.is_err());
/// assert_eq!(sensor.read_particulate().await.unwrap().pm2_5, 5.0);
/// # }
/// ```
#[derive(Debug)]
pub struct MockParticulateSensor {
    name: String,
    sample: RwLock<ParticulateSample>,
    noise: RwLock<f64>,
    faults: FaultInjector,
}

impl MockParticulateSensor {
    pub fn new(pm1_0: f64, pm2_5: f64, pm10: f64) -> Self {
        Self {
            name: "mock-particulate".to_string(),
            sample: RwLock::new(ParticulateSample::new(pm1_0, pm2_5, pm10)),
            noise: RwLock::new(0.0),
            faults: FaultInjector::new(),
        }
    }

    /// A sensor that wanders around typical clean indoor values.
    pub fn simulated() -> Self {
        Self {
            name: "simulated-particulate".to_string(),
            noise: RwLock::new(2.0),
            ..Self::new(3.0, 6.0, 9.0)
        }
    }

    /// Replace the values returned by subsequent reads.
    pub async fn set_values(&self, pm1_0: f64, pm2_5: f64, pm10: f64) {
        *self.sample.write().await = ParticulateSample::new(pm1_0, pm2_5, pm10);
    }

    /// Add up to ±`amplitude` µg/m³ of random variation to each value.
    pub async fn set_noise(&self, amplitude: f64) {
        *self.noise.write().await = amplitude;
    }

    /// Make every read fail (or stop failing).
    pub fn set_should_fail(&self, fail: bool) {
        self.faults.should_fail.store(fail, Ordering::Relaxed);
    }

    /// Fail the next `count` reads, then recover.
    pub fn fail_next(&self, count: u32) {
        self.faults.remaining_failures.store(count, Ordering::Relaxed);
    }

    /// Message carried by injected failures.
    pub async fn set_fail_message(&self, message: &str) {
        *self.faults.fail_message.write().await = message.to_string();
    }

    /// Delay every read by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.faults.latency_ms.store(ms, Ordering::Relaxed);
    }

    /// Number of reads attempted so far.
    pub fn read_count(&self) -> u32 {
        self.faults.read_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ParticulateSensor for MockParticulateSensor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_particulate(&self) -> Result<ParticulateSample, SensorFault> {
        self.faults.begin_read().await?;

        let sample = *self.sample.read().await;
        let noise = *self.noise.read().await;
        if noise <= 0.0 {
            return Ok(sample);
        }

        // Keep PM1.0 <= PM2.5 <= PM10 like a real optical counter.
        let pm1_0 = jitter(sample.pm1_0, noise).max(0.0);
        let pm2_5 = jitter(sample.pm2_5, noise).max(pm1_0);
        let pm10 = jitter(sample.pm10, noise).max(pm2_5);
        Ok(ParticulateSample::new(pm1_0.round(), pm2_5.round(), pm10.round()))
    }
}

/// A mock temperature/humidity sensor.
#[derive(Debug)]
pub struct MockClimateSensor {
    name: String,
    sample: RwLock<ClimateSample>,
    noise: RwLock<f64>,
    faults: FaultInjector,
}

impl MockClimateSensor {
    pub fn new(temperature_c: f64, humidity: f64) -> Self {
        Self {
            name: "mock-climate".to_string(),
            sample: RwLock::new(ClimateSample::new(temperature_c, humidity)),
            noise: RwLock::new(0.0),
            faults: FaultInjector::new(),
        }
    }

    /// A sensor that wanders around room conditions.
    pub fn simulated() -> Self {
        Self {
            name: "simulated-climate".to_string(),
            noise: RwLock::new(0.5),
            ..Self::new(21.5, 45.0)
        }
    }

    pub async fn set_values(&self, temperature_c: f64, humidity: f64) {
        *self.sample.write().await = ClimateSample::new(temperature_c, humidity);
    }

    /// Add up to ±`amplitude` of random variation to both values.
    pub async fn set_noise(&self, amplitude: f64) {
        *self.noise.write().await = amplitude;
    }

    pub fn set_should_fail(&self, fail: bool) {
        self.faults.should_fail.store(fail, Ordering::Relaxed);
    }

    pub fn fail_next(&self, count: u32) {
        self.faults.remaining_failures.store(count, Ordering::Relaxed);
    }

    pub async fn set_fail_message(&self, message: &str) {
        *self.faults.fail_message.write().await = message.to_string();
    }

    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.faults.latency_ms.store(ms, Ordering::Relaxed);
    }

    pub fn read_count(&self) -> u32 {
        self.faults.read_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ClimateSensor for MockClimateSensor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_climate(&self) -> Result<ClimateSample, SensorFault> {
        self.faults.begin_read().await?;

        let sample = *self.sample.read().await;
        let noise = *self.noise.read().await;
        Ok(ClimateSample::new(
            jitter(sample.temperature_c, noise),
            jitter(sample.humidity, noise).clamp(0.0, 100.0),
        ))
    }
}
