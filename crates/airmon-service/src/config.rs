//! Service configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use airmon_core::BackoffConfig;

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Sampling cadence, history window and retry policy.
    pub sampling: SamplingConfig,
    /// Session log settings.
    pub logging: LoggingConfig,
    /// Sensor hardware settings.
    pub sensors: SensorsConfig,
    /// Host status sources.
    pub system: SystemConfig,
    /// Host shutdown command.
    pub shutdown: ShutdownConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Server bind address is valid (host:port format, non-zero port)
    /// - Sampling interval is 1 s - 1 hour and the window covers at least one interval
    /// - Read timeout is positive and no longer than the interval
    /// - Backoff delays are ordered and the multiplier is at least 1
    /// - I²C addresses fit in 7 bits
    /// - The log directory is set when logging is enabled
    ///
    /// # Example
    ///
    /// ```
    /// use airmon_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.sampling.validate());
        errors.extend(self.logging.validate());
        errors.extend(self.sensors.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError::new("server.bind", "bind address cannot be empty"));
            return errors;
        }

        let Some((_, port)) = self.bind.rsplit_once(':') else {
            errors.push(ValidationError::new(
                "server.bind",
                format!(
                    "invalid bind address '{}': expected format 'host:port'",
                    self.bind
                ),
            ));
            return errors;
        };

        match port.parse::<u16>() {
            Ok(0) => errors.push(ValidationError::new("server.bind", "port cannot be 0")),
            Err(_) => errors.push(ValidationError::new(
                "server.bind",
                format!("invalid port '{}': must be a number 1-65535", port),
            )),
            Ok(_) => {}
        }

        errors
    }
}

/// Minimum sampling interval in seconds.
pub const MIN_INTERVAL_SECS: u64 = 1;
/// Maximum sampling interval in seconds (1 hour).
pub const MAX_INTERVAL_SECS: u64 = 3600;

/// Sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Seconds between samples.
    pub interval_secs: u64,
    /// Seconds of history kept for `/api/history`.
    pub window_secs: u64,
    /// Per-sensor read timeout in milliseconds.
    pub read_timeout_ms: u64,
    /// Retry policy after a failed read.
    pub backoff: BackoffSettings,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            window_secs: 15 * 60,
            read_timeout_ms: 2000,
            backoff: BackoffSettings::default(),
        }
    }
}

impl SamplingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Validate sampling configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.interval_secs < MIN_INTERVAL_SECS {
            errors.push(ValidationError::new(
                "sampling.interval_secs",
                format!(
                    "interval {} is too short (minimum {} second)",
                    self.interval_secs, MIN_INTERVAL_SECS
                ),
            ));
        } else if self.interval_secs > MAX_INTERVAL_SECS {
            errors.push(ValidationError::new(
                "sampling.interval_secs",
                format!(
                    "interval {} is too long (maximum {} seconds / 1 hour)",
                    self.interval_secs, MAX_INTERVAL_SECS
                ),
            ));
        }

        if self.window_secs < self.interval_secs {
            errors.push(ValidationError::new(
                "sampling.window_secs",
                format!(
                    "window {}s is shorter than the sampling interval {}s",
                    self.window_secs, self.interval_secs
                ),
            ));
        }

        if self.read_timeout_ms == 0 {
            errors.push(ValidationError::new(
                "sampling.read_timeout_ms",
                "read timeout cannot be 0",
            ));
        } else if self.read_timeout_ms > self.interval_secs.saturating_mul(1000) {
            errors.push(ValidationError::new(
                "sampling.read_timeout_ms",
                format!(
                    "read timeout {}ms is longer than the sampling interval",
                    self.read_timeout_ms
                ),
            ));
        }

        errors.extend(self.backoff.validate());
        errors
    }
}

/// Retry delays after a failed sensor read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on any retry delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor per consecutive failure.
    pub multiplier: f64,
    /// Randomly stretch delays by up to 25%.
    pub jitter: bool,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        let defaults = BackoffConfig::default();
        Self {
            initial_delay_ms: defaults.initial_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
            multiplier: defaults.multiplier,
            jitter: defaults.jitter,
        }
    }
}

impl BackoffSettings {
    /// Convert to the sampler's backoff policy.
    pub fn to_backoff_config(&self) -> BackoffConfig {
        BackoffConfig::default()
            .initial_delay(Duration::from_millis(self.initial_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .multiplier(self.multiplier)
            .jitter(self.jitter)
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.initial_delay_ms == 0 {
            errors.push(ValidationError::new(
                "sampling.backoff.initial_delay_ms",
                "initial delay cannot be 0",
            ));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            errors.push(ValidationError::new(
                "sampling.backoff.max_delay_ms",
                format!(
                    "max delay {}ms is shorter than the initial delay {}ms",
                    self.max_delay_ms, self.initial_delay_ms
                ),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            errors.push(ValidationError::new(
                "sampling.backoff.multiplier",
                format!("multiplier {} must be at least 1.0", self.multiplier),
            ));
        }

        errors
    }
}

/// Session log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write a CSV row for every successful sample.
    pub enabled: bool,
    /// Directory for `session-*.csv` files.
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: airmon_store::default_log_dir(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.enabled && self.dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "logging.dir",
                "log directory cannot be empty when logging is enabled",
            ));
        }
        errors
    }
}

/// Largest 7-bit I²C address.
pub const MAX_I2C_ADDRESS: u16 = 0x7F;

/// Sensor hardware configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    /// Use simulated sensors instead of the I²C bus.
    pub simulate: bool,
    /// I²C bus device node.
    pub i2c_bus: PathBuf,
    /// PMSA003I address.
    pub particulate_address: u16,
    /// AHT20 address.
    pub climate_address: u16,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            simulate: false,
            i2c_bus: PathBuf::from("/dev/i2c-1"),
            particulate_address: 0x12,
            climate_address: 0x38,
        }
    }
}

impl SensorsConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !self.simulate && self.i2c_bus.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "sensors.i2c_bus",
                "I2C bus path cannot be empty",
            ));
        }

        for (field, address) in [
            ("sensors.particulate_address", self.particulate_address),
            ("sensors.climate_address", self.climate_address),
        ] {
            if address > MAX_I2C_ADDRESS {
                errors.push(ValidationError::new(
                    field,
                    format!("address {:#04x} is not a 7-bit I2C address", address),
                ));
            }
        }

        if self.particulate_address == self.climate_address {
            errors.push(ValidationError::new(
                "sensors.climate_address",
                format!(
                    "both sensors use address {:#04x}",
                    self.climate_address
                ),
            ));
        }

        errors
    }
}

/// Host status sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// CPU temperature in millidegrees Celsius.
    pub thermal_zone: PathBuf,
    /// Host uptime in seconds (first field).
    pub uptime: PathBuf,
    /// Wireless interface statistics.
    pub wireless: PathBuf,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            thermal_zone: PathBuf::from("/sys/class/thermal/thermal_zone0/temp"),
            uptime: PathBuf::from("/proc/uptime"),
            wireless: PathBuf::from("/proc/net/wireless"),
        }
    }
}

/// Host shutdown configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Program and arguments run by `/shutdown`, e.g.
    /// `["sudo", "shutdown", "-h", "now"]`. Empty stops only this service.
    pub command: Vec<String>,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `sampling.backoff.multiplier`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("airmon")
        .join("server.toml")
}
