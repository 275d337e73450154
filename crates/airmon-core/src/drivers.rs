//! I²C drivers for the PMSA003I particulate sensor and the AHT20
//! thermo-hygrometer.
//!
//! Both drivers are generic over [`embedded_hal::i2c::I2c`]. On Linux the
//! `open` constructors use an i2c-dev bus from `linux-embedded-hal`.
//! Bus transactions are blocking, so every read runs on tokio's blocking
//! pool and holds the device lock for the whole transaction.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};
use tracing::debug;

use airmon_types::types::{AHT20_STATUS_CALIBRATED, PMSA003I_FRAME_LEN};
use airmon_types::{ClimateSample, ParseError, ParticulateSample};

use crate::error::{Error, SensorFault, SensorKind};
use crate::traits::{ClimateSensor, ParticulateSensor};

/// Default PMSA003I address.
pub const PMSA003I_ADDRESS: u8 = 0x12;
/// Default AHT20 address.
pub const AHT20_ADDRESS: u8 = 0x38;

const AHT20_CMD_CALIBRATE: [u8; 3] = [0xBE, 0x08, 0x00];
const AHT20_CMD_MEASURE: [u8; 3] = [0xAC, 0x33, 0x00];
const AHT20_MEASURE_DELAY_MS: u32 = 80;
const AHT20_CALIBRATE_DELAY_MS: u32 = 10;
/// Busy polls before a measurement is reported as not ready.
pub const AHT20_BUSY_RETRIES: u32 = 3;
/// AHT20 response: status, five data bytes, CRC.
const AHT20_RESPONSE_LEN: usize = 7;

fn bus_fault<E: embedded_hal::i2c::Error>(e: E) -> SensorFault {
    SensorFault::Bus(e.kind())
}

/// Run a blocking bus transaction on the blocking pool.
async fn with_device<D, T, F>(device: &Arc<Mutex<D>>, op: F) -> Result<T, SensorFault>
where
    D: Send + 'static,
    T: Send + 'static,
    F: FnOnce(&mut D) -> Result<T, SensorFault> + Send + 'static,
{
    let device = Arc::clone(device);
    tokio::task::spawn_blocking(move || {
        let mut guard = device
            .lock()
            .map_err(|_| SensorFault::Unavailable("device lock poisoned".to_string()))?;
        op(&mut guard)
    })
    .await
    .map_err(|e| SensorFault::Unavailable(format!("bus task failed: {e}")))?
}

/// Plantower PMSA003I on I²C.
pub struct Pmsa003i<I> {
    i2c: Arc<Mutex<I>>,
    address: u8,
}

impl<I: I2c> Pmsa003i<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self {
            i2c: Arc::new(Mutex::new(i2c)),
            address,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }
}

#[async_trait]
impl<I> ParticulateSensor for Pmsa003i<I>
where
    I: I2c + Send + 'static,
{
    fn name(&self) -> &str {
        "PMSA003I"
    }

    async fn read_particulate(&self) -> Result<ParticulateSample, SensorFault> {
        let address = self.address;
        with_device(&self.i2c, move |i2c| {
            let mut frame = [0u8; PMSA003I_FRAME_LEN];
            i2c.read(address, &mut frame).map_err(bus_fault)?;
            Ok(ParticulateSample::from_pmsa003i_frame(&frame)?)
        })
        .await
    }
}

struct Aht20Bus<I, D> {
    i2c: I,
    delay: D,
    address: u8,
}

impl<I: I2c, D: DelayNs> Aht20Bus<I, D> {
    /// Trigger a measurement and poll until the busy bit clears.
    fn measure(&mut self) -> Result<ClimateSample, SensorFault> {
        self.i2c
            .write(self.address, &AHT20_CMD_MEASURE)
            .map_err(bus_fault)?;

        for attempt in 1..=AHT20_BUSY_RETRIES {
            self.delay.delay_ms(AHT20_MEASURE_DELAY_MS);
            let mut data = [0u8; AHT20_RESPONSE_LEN];
            self.i2c.read(self.address, &mut data).map_err(bus_fault)?;
            match ClimateSample::from_aht20_bytes(&data) {
                Ok(sample) => return Ok(sample),
                Err(ParseError::NotReady) => debug!(attempt, "AHT20 busy"),
                Err(e) => return Err(e.into()),
            }
        }
        Err(ParseError::NotReady.into())
    }
}

/// Aosong AHT20 on I²C.
pub struct Aht20<I, D> {
    bus: Arc<Mutex<Aht20Bus<I, D>>>,
}

impl<I: I2c, D: DelayNs> Aht20<I, D> {
    /// Initialize the sensor, calibrating it if the status byte says so.
    ///
    /// Blocks the calling thread for a few milliseconds while calibrating.
    pub fn new(mut i2c: I, mut delay: D, address: u8) -> Result<Self, Error> {
        let init_error = |reason: String| Error::Init {
            sensor: SensorKind::Climate,
            reason,
        };

        let mut status = [0u8; 1];
        i2c.read(address, &mut status)
            .map_err(|e| init_error(format!("status read failed: {}", e.kind())))?;

        if status[0] & AHT20_STATUS_CALIBRATED == 0 {
            debug!("AHT20 not calibrated, sending calibration command");
            i2c.write(address, &AHT20_CMD_CALIBRATE)
                .map_err(|e| init_error(format!("calibration failed: {}", e.kind())))?;
            delay.delay_ms(AHT20_CALIBRATE_DELAY_MS);
        }

        Ok(Self {
            bus: Arc::new(Mutex::new(Aht20Bus {
                i2c,
                delay,
                address,
            })),
        })
    }
}

#[async_trait]
impl<I, D> ClimateSensor for Aht20<I, D>
where
    I: I2c + Send + 'static,
    D: DelayNs + Send + 'static,
{
    fn name(&self) -> &str {
        "AHT20"
    }

    async fn read_climate(&self) -> Result<ClimateSample, SensorFault> {
        with_device(&self.bus, Aht20Bus::measure).await
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use std::path::Path;

    use linux_embedded_hal::{Delay, I2cdev};
    use tracing::info;

    use super::*;

    fn open_bus(path: &Path, address: u8) -> Result<I2cdev, Error> {
        I2cdev::new(path).map_err(|e| Error::Bus {
            path: path.to_path_buf(),
            address,
            source: Box::new(e),
        })
    }

    impl Pmsa003i<I2cdev> {
        /// Open the sensor at `address` on the i2c-dev bus at `path`.
        pub fn open(path: impl AsRef<Path>, address: u8) -> Result<Self, Error> {
            let path = path.as_ref();
            let sensor = Self::new(open_bus(path, address)?, address);
            info!(
                path = %path.display(),
                address = format_args!("{:#04x}", address),
                "Opened PMSA003I"
            );
            Ok(sensor)
        }
    }

    impl Aht20<I2cdev, Delay> {
        /// Open and initialize the sensor at `address` on the bus at `path`.
        pub fn open(path: impl AsRef<Path>, address: u8) -> Result<Self, Error> {
            let path = path.as_ref();
            let sensor = Self::new(open_bus(path, address)?, Delay, address)?;
            info!(
                path = %path.display(),
                address = format_args!("{:#04x}", address),
                "Opened AHT20"
            );
            Ok(sensor)
        }
    }

}
