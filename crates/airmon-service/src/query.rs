//! Read-only queries over the shared state.
//!
//! [`QueryApi`] is what the HTTP layer talks to. Every call returns a
//! snapshot and never waits on the sampler.

use std::sync::Arc;

use serde::Serialize;

use airmon_types::Reading;

use crate::state::AppState;
use crate::status::SystemStatus;

/// Message returned by `/api/data` before the first sample.
pub const NO_DATA_YET: &str = "No data yet";

/// JSON shape of a reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingView {
    /// Wall-clock capture time as fractional Unix seconds.
    pub ts: f64,
    pub time_iso: String,
    pub temp_c: f64,
    pub temp_f: f64,
    pub humidity: f64,
    pub pm1: f64,
    pub pm25: f64,
    pub pm10: f64,
    /// Human label, e.g. "Unhealthy for Sensitive Groups".
    pub aqi_category: &'static str,
    /// Stable key, e.g. "unhealthy_sensitive".
    pub aqi_level: &'static str,
    pub aqi_advisory: &'static str,
}

impl From<&Reading> for ReadingView {
    fn from(reading: &Reading) -> Self {
        let timestamp = reading.timestamp();
        let category = reading.aqi_category();
        Self {
            ts: timestamp.unix_seconds(),
            time_iso: timestamp.iso_seconds(),
            temp_c: round1(reading.temperature_c()),
            temp_f: round1(reading.temperature_f()),
            humidity: round1(reading.humidity()),
            pm1: round1(reading.pm1_0()),
            pm25: round1(reading.pm2_5()),
            pm10: round1(reading.pm10()),
            aqi_category: category.label(),
            aqi_level: category.key(),
            aqi_advisory: category.advisory(),
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Body of `/api/data`.
#[derive(Debug, Clone, Serialize)]
pub struct LatestPayload {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ReadingView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    pub system: SystemStatus,
}

/// Body of `/api/history`.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPayload {
    pub ok: bool,
    pub window_secs: u64,
    /// Oldest first.
    pub points: Vec<ReadingView>,
}

/// Read-only facade over [`AppState`].
#[derive(Debug, Clone)]
pub struct QueryApi {
    state: Arc<AppState>,
}

impl QueryApi {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Most recent reading, `None` before the first sample.
    pub fn latest(&self) -> Option<Reading> {
        self.state.history.latest()
    }

    /// Retained readings, oldest first.
    pub fn history(&self) -> Vec<Reading> {
        self.state.history.history()
    }

    /// Host status and sampler health, computed now.
    pub async fn system_status(&self) -> SystemStatus {
        SystemStatus {
            host: self.state.inspector.host_status().await,
            sampler: self.state.sampler.snapshot().await,
        }
    }

    /// Latest reading with system status, or the "no data yet" placeholder.
    pub async fn latest_payload(&self) -> LatestPayload {
        let latest = self.latest();
        let system = self.system_status().await;
        match latest {
            Some(reading) => LatestPayload {
                ok: true,
                data: Some(ReadingView::from(&reading)),
                error: None,
                system,
            },
            None => LatestPayload {
                ok: false,
                data: None,
                error: Some(NO_DATA_YET),
                system,
            },
        }
    }

    /// Chart-ready history.
    pub fn history_payload(&self) -> HistoryPayload {
        HistoryPayload {
            ok: true,
            window_secs: self.state.history.window().as_secs(),
            points: self.history().iter().map(ReadingView::from).collect(),
        }
    }
}
