//! Host status: CPU temperature, WiFi signal, uptime, address and hostname.
//!
//! Every host lookup is best-effort. A missing file or unexpected format yields
//! `None` (or `"N/A"` for the display strings) instead of an error.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::net::UdpSocket;
use tracing::trace;

use airmon_types::celsius_to_fahrenheit;

use crate::config::SystemConfig;
use crate::state::SamplerStatus;

/// Placeholder for unavailable display values.
pub const NOT_AVAILABLE: &str = "N/A";

/// Remote address used to pick the outbound interface. Nothing is sent.
const ROUTE_LOOKUP_ADDR: &str = "8.8.8.8:80";

/// Host status plus sampler health, recomputed per query.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    #[serde(flatten)]
    pub host: HostStatus,
    pub sampler: SamplerStatus,
}

/// Host-level status.
#[derive(Debug, Clone, Serialize)]
pub struct HostStatus {
    pub cpu_temp_c: Option<f64>,
    pub cpu_temp_f: Option<f64>,
    /// Signal level in dBm.
    pub wifi_rssi: Option<i32>,
    /// `HH:MM:SS`, or `"N/A"`.
    pub uptime: String,
    pub uptime_seconds: Option<u64>,
    /// Outbound IPv4 address, or `"N/A"`.
    pub ip: String,
    pub hostname: Option<String>,
}

/// Reads host status from procfs/sysfs paths.
#[derive(Debug, Clone)]
pub struct HostInspector {
    thermal_zone: PathBuf,
    uptime: PathBuf,
    wireless: PathBuf,
}

impl HostInspector {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            thermal_zone: config.thermal_zone.clone(),
            uptime: config.uptime.clone(),
            wireless: config.wireless.clone(),
        }
    }

    /// Collect all host readings.
    pub async fn host_status(&self) -> HostStatus {
        let cpu_temp_c = self.cpu_temp_c().await;
        let uptime_seconds = self.uptime_seconds().await;

        HostStatus {
            cpu_temp_c,
            cpu_temp_f: cpu_temp_c.map(|c| round1(celsius_to_fahrenheit(c))),
            wifi_rssi: self.wifi_rssi().await,
            uptime: uptime_seconds.map_or_else(|| NOT_AVAILABLE.to_string(), format_uptime),
            uptime_seconds,
            ip: local_ip().await.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            hostname: hostname::get().ok().and_then(|h| h.into_string().ok()),
        }
    }

    /// CPU temperature in °C, rounded to one decimal.
    pub async fn cpu_temp_c(&self) -> Option<f64> {
        let raw = read_trimmed(&self.thermal_zone).await?;
        parse_millidegrees(&raw)
    }

    /// Host uptime in whole seconds.
    pub async fn uptime_seconds(&self) -> Option<u64> {
        let raw = read_trimmed(&self.uptime).await?;
        parse_uptime(&raw)
    }

    /// Signal level of the first wireless interface, in dBm.
    pub async fn wifi_rssi(&self) -> Option<i32> {
        let raw = read_trimmed(&self.wireless).await?;
        parse_wireless_level(&raw)
    }
}

async fn read_trimmed(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Some(content.trim().to_string()),
        Err(e) => {
            trace!("Cannot read {}: {}", path.display(), e);
            None
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn parse_millidegrees(raw: &str) -> Option<f64> {
    let milli: f64 = raw.parse().ok()?;
    Some(round1(milli / 1000.0))
}

fn parse_uptime(raw: &str) -> Option<u64> {
    let secs: f64 = raw.split_whitespace().next()?.parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then_some(secs as u64)
}

/// Parse `/proc/net/wireless`.
///
/// ```text
/// Inter-| sta-|   Quality        |   Discarded packets               | Missed | WE
///  face | tus | link level noise |  nwid  crypt   frag  retry   misc | beacon | 22
///  wlan0: 0000   54.  -56.  -256        0      0      0      0     54        0
/// ```
fn parse_wireless_level(raw: &str) -> Option<i32> {
    raw.lines()
        .skip(2)
        .find_map(|line| {
            let (_, stats) = line.split_once(':')?;
            let level = stats.split_whitespace().nth(2)?;
            level.trim_end_matches('.').parse::<f64>().ok()
        })
        .map(|dbm| dbm.round() as i32)
}

/// Format seconds as `HH:MM:SS`; hours are not wrapped at 24.
pub fn format_uptime(seconds: u64) -> String {
    let (minutes, secs) = (seconds / 60, seconds % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Address of the interface that routes to the internet.
async fn local_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").await.ok()?;
    socket.connect(ROUTE_LOOKUP_ADDR).await.ok()?;
    let addr = socket.local_addr().ok()?;
    Some(addr.ip().to_string())
}
