//! Sampling loop and HTTP API for the airmon air-quality monitor.
//!
//! This crate provides a service that:
//! - Reads a PMSA003I particulate sensor and an AHT20 thermo-hygrometer
//!   on a fixed cadence
//! - Keeps a rolling window of readings in memory
//! - Appends every reading to a per-session CSV log
//! - Exposes the latest reading, the history and host status as JSON
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check
//! - `GET /api/data` - Latest reading plus system status
//! - `GET /api/history` - Readings in the retention window, oldest first
//! - `GET /api/status` - Host status and sampler health
//! - `GET|POST /shutdown` - Stop the monitor
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/airmon/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:5000"
//!
//! [sampling]
//! interval_secs = 5
//! window_secs = 900
//!
//! [sensors]
//! i2c_bus = "/dev/i2c-1"
//!
//! [shutdown]
//! command = ["sudo", "shutdown", "-h", "now"]
//! ```

pub mod api;
pub mod config;
pub mod query;
pub mod sampler;
pub mod shutdown;
pub mod state;
pub mod status;

pub use config::{
    BackoffSettings, Config, ConfigError, LoggingConfig, SamplingConfig, SensorsConfig,
    ServerConfig, ShutdownConfig, SystemConfig, ValidationError,
};
pub use query::{HistoryPayload, LatestPayload, QueryApi, ReadingView};
pub use sampler::Sampler;
pub use shutdown::{CommandShutdown, ProcessShutdown, ShutdownError, ShutdownHandle};
pub use state::{AppState, SamplerPhase, SamplerState, SamplerStatus};
pub use status::{HostInspector, HostStatus, SystemStatus};
