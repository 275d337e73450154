//! Core types for airmon sensor data.

use core::cmp::Ordering;
use core::fmt;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use crate::aqi::{AqiCategory, classify};
use crate::error::{ParseError, ParseResult};

/// Length of a PMSA003I data frame in bytes.
pub const PMSA003I_FRAME_LEN: usize = 32;

/// Start-of-frame marker for PMSA003I frames ("BM").
pub const PMSA003I_HEADER: [u8; 2] = [0x42, 0x4D];

/// Minimum AHT20 measurement response (status + 5 data bytes).
pub const AHT20_MEASUREMENT_LEN: usize = 6;

/// AHT20 status bit: measurement in progress.
pub const AHT20_STATUS_BUSY: u8 = 0x80;

/// AHT20 status bit: calibration coefficients loaded.
pub const AHT20_STATUS_CALIBRATED: u8 = 0x08;

/// Point in time of a sample.
///
/// `monotonic` is the offset from a process-wide clock origin and is the
/// component used for ordering and window eviction. `wall` is UTC wall-clock
/// time, used for display and the session log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub wall: OffsetDateTime,
    pub monotonic: Duration,
}

impl Timestamp {
    pub fn new(wall: OffsetDateTime, monotonic: Duration) -> Self {
        Self { wall, monotonic }
    }

    /// Wall-clock time as fractional Unix seconds.
    #[must_use]
    pub fn unix_seconds(&self) -> f64 {
        self.wall.unix_timestamp_nanos() as f64 / 1e9
    }

    /// Monotonic time elapsed since `earlier`, zero if `earlier` is later.
    #[must_use]
    pub fn since(&self, earlier: &Timestamp) -> Duration {
        self.monotonic.saturating_sub(earlier.monotonic)
    }

    /// Wall-clock time as RFC 3339 in UTC, truncated to whole seconds
    /// (e.g. `2024-05-01T12:30:05Z`).
    #[must_use]
    pub fn iso_seconds(&self) -> String {
        let utc = self.wall.to_offset(UtcOffset::UTC);
        let utc = utc.replace_nanosecond(0).unwrap_or(utc);
        utc.format(&Rfc3339).unwrap_or_else(|_| utc.to_string())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.monotonic
            .cmp(&other.monotonic)
            .then_with(|| self.wall.cmp(&other.wall))
    }
}

/// Output of the thermo-hygrometer.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClimateSample {
    /// Temperature in degrees Celsius.
    pub temperature_c: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
}

impl ClimateSample {
    pub fn new(temperature_c: f64, humidity: f64) -> Self {
        Self {
            temperature_c,
            humidity,
        }
    }

    /// Decode an AHT20 measurement response.
    ///
    /// Layout: status byte, 20-bit humidity, 20-bit temperature (the two
    /// share the middle nibble of byte 3). When a seventh byte is present it
    /// is checked as the CRC-8 of the first six.
    ///
    /// # Examples
    ///
    /// ```
    /// use airmon_types::ClimateSample;
    ///
    /// // 50% RH and 25 °C
    /// let raw = [0x1C, 0x80, 0x00, 0x06, 0x00, 0x00];
    /// let sample = ClimateSample::from_aht20_bytes(&raw).unwrap();
    /// assert!((sample.humidity - 50.0).abs() < 0.01);
    /// assert!((sample.temperature_c - 25.0).abs() < 0.01);
    /// ```
    pub fn from_aht20_bytes(data: &[u8]) -> ParseResult<Self> {
        use bytes::Buf;

        if data.len() < AHT20_MEASUREMENT_LEN {
            return Err(ParseError::InsufficientBytes {
                expected: AHT20_MEASUREMENT_LEN,
                actual: data.len(),
            });
        }

        if let Some(&crc) = data.get(AHT20_MEASUREMENT_LEN) {
            let computed = aht20_crc8(&data[..AHT20_MEASUREMENT_LEN]);
            if crc != computed {
                return Err(ParseError::ChecksumMismatch {
                    expected: u16::from(crc),
                    computed: u16::from(computed),
                });
            }
        }

        let mut buf = &data[..AHT20_MEASUREMENT_LEN];
        let status = buf.get_u8();
        if status & AHT20_STATUS_BUSY != 0 {
            return Err(ParseError::NotReady);
        }

        let b1 = u32::from(buf.get_u8());
        let b2 = u32::from(buf.get_u8());
        let b3 = u32::from(buf.get_u8());
        let b4 = u32::from(buf.get_u8());
        let b5 = u32::from(buf.get_u8());

        let humidity_raw = (b1 << 12) | (b2 << 4) | (b3 >> 4);
        let temperature_raw = ((b3 & 0x0F) << 16) | (b4 << 8) | b5;

        const SCALE: f64 = (1u32 << 20) as f64;
        Ok(Self {
            humidity: f64::from(humidity_raw) / SCALE * 100.0,
            temperature_c: f64::from(temperature_raw) / SCALE * 200.0 - 50.0,
        })
    }
}

/// CRC-8 used by the AHT20 (polynomial 0x31, initial value 0xFF).
#[must_use]
pub fn aht20_crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Mass concentrations from the particulate sensor, in µg/m³.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParticulateSample {
    pub pm1_0: f64,
    pub pm2_5: f64,
    pub pm10: f64,
}

impl ParticulateSample {
    pub fn new(pm1_0: f64, pm2_5: f64, pm10: f64) -> Self {
        Self { pm1_0, pm2_5, pm10 }
    }

    /// Decode a 32-byte PMSA003I frame.
    ///
    /// Uses the "standard particle" concentrations (CF=1), which are the
    /// first three data words of the frame. All words are big-endian and the
    /// trailing checksum is the sum of the preceding 30 bytes.
    pub fn from_pmsa003i_frame(data: &[u8]) -> ParseResult<Self> {
        use bytes::Buf;

        if data.len() < PMSA003I_FRAME_LEN {
            return Err(ParseError::InsufficientBytes {
                expected: PMSA003I_FRAME_LEN,
                actual: data.len(),
            });
        }

        let frame = &data[..PMSA003I_FRAME_LEN];
        if frame[..2] != PMSA003I_HEADER {
            return Err(ParseError::InvalidHeader([frame[0], frame[1]]));
        }

        let computed = frame[..PMSA003I_FRAME_LEN - 2]
            .iter()
            .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)));
        let expected = u16::from_be_bytes([frame[30], frame[31]]);
        if computed != expected {
            return Err(ParseError::ChecksumMismatch { expected, computed });
        }

        let mut buf = &frame[2..];
        let length = buf.get_u16();
        if usize::from(length) != PMSA003I_FRAME_LEN - 4 {
            return Err(ParseError::InvalidData(format!(
                "unexpected frame length {}",
                length
            )));
        }

        let pm1_0 = buf.get_u16();
        let pm2_5 = buf.get_u16();
        let pm10 = buf.get_u16();

        Ok(Self {
            pm1_0: f64::from(pm1_0),
            pm2_5: f64::from(pm2_5),
            pm10: f64::from(pm10),
        })
    }
}

/// One fused sample of particulate and climate data plus its AQI category.
///
/// A `Reading` can only be built through [`Reading::new`], which rejects
/// negative or non-finite values and derives the category, so every
/// instance satisfies the reading invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    timestamp: Timestamp,
    climate: ClimateSample,
    particulate: ParticulateSample,
    aqi: AqiCategory,
}

impl Reading {
    /// Build a reading from both sensor samples.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use airmon_types::{AqiCategory, ClimateSample, ParticulateSample, Reading, Timestamp};
    /// use time::OffsetDateTime;
    ///
    /// let ts = Timestamp::new(OffsetDateTime::UNIX_EPOCH, Duration::ZERO);
    /// let reading = Reading::new(
    ///     ts,
    ///     ClimateSample::new(20.0, 40.0),
    ///     ParticulateSample::new(3.0, 10.0, 20.0),
    /// ).unwrap();
    /// assert_eq!(reading.aqi_category(), AqiCategory::Good);
    /// assert_eq!(reading.temperature_f(), 68.0);
    /// ```
    pub fn new(
        timestamp: Timestamp,
        climate: ClimateSample,
        particulate: ParticulateSample,
    ) -> ParseResult<Self> {
        check_concentration("pm1_0", particulate.pm1_0)?;
        check_concentration("pm2_5", particulate.pm2_5)?;
        check_concentration("pm10", particulate.pm10)?;

        if !climate.temperature_c.is_finite() {
            return Err(ParseError::InvalidValue {
                field: "temperature_c",
                value: climate.temperature_c,
            });
        }
        if !(0.0..=100.0).contains(&climate.humidity) {
            return Err(ParseError::InvalidValue {
                field: "humidity",
                value: climate.humidity,
            });
        }

        Ok(Self {
            timestamp,
            climate,
            particulate,
            aqi: classify(particulate.pm2_5, particulate.pm10),
        })
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Wall-clock capture time (UTC).
    pub fn captured_at(&self) -> OffsetDateTime {
        self.timestamp.wall
    }

    pub fn climate(&self) -> ClimateSample {
        self.climate
    }

    pub fn particulate(&self) -> ParticulateSample {
        self.particulate
    }

    pub fn temperature_c(&self) -> f64 {
        self.climate.temperature_c
    }

    /// Temperature in degrees Fahrenheit, derived from the Celsius value.
    pub fn temperature_f(&self) -> f64 {
        celsius_to_fahrenheit(self.climate.temperature_c)
    }

    pub fn humidity(&self) -> f64 {
        self.climate.humidity
    }

    pub fn pm1_0(&self) -> f64 {
        self.particulate.pm1_0
    }

    pub fn pm2_5(&self) -> f64 {
        self.particulate.pm2_5
    }

    pub fn pm10(&self) -> f64 {
        self.particulate.pm10
    }

    pub fn aqi_category(&self) -> AqiCategory {
        self.aqi
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1}°C {:.1}% PM1.0={:.0} PM2.5={:.0} PM10={:.0} ({})",
            self.temperature_c(),
            self.humidity(),
            self.pm1_0(),
            self.pm2_5(),
            self.pm10(),
            self.aqi
        )
    }
}

fn check_concentration(field: &'static str, value: f64) -> ParseResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ParseError::InvalidValue { field, value })
    }
}

/// Convert Celsius to Fahrenheit.
#[must_use]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}
