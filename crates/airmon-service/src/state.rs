//! Application state shared across handlers and the sampler.
//!
//! # Locks
//!
//! - **`history`** (`std::sync::RwLock` inside [`HistoryStore`]): the only lock
//!   around reading data. The sampler takes the write side for one append;
//!   handlers take the read side for one copy. Never held across I/O.
//! - **`sampler`** ([`SamplerState`]): counters are atomics; the last error
//!   and log status sit behind short-lived `RwLock`s.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, AtomicU32, AtomicU64, Ordering};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use airmon_store::HistoryStore;

use crate::config::Config;
use crate::shutdown::ShutdownHandle;
use crate::status::HostInspector;

/// Shared application state.
pub struct AppState {
    /// Rolling window of recent readings.
    pub history: HistoryStore,
    /// Configuration the service was started with.
    pub config: Config,
    /// Sampler health, published for status queries.
    pub sampler: SamplerState,
    /// Host status inspector.
    pub inspector: HostInspector,
    /// Capability behind `/shutdown`.
    pub shutdown: Arc<dyn ShutdownHandle>,
}

impl AppState {
    /// Create new application state.
    ///
    /// The history window and status file paths come from `config`.
    pub fn new(config: Config, shutdown: Arc<dyn ShutdownHandle>) -> Arc<Self> {
        Arc::new(Self {
            history: HistoryStore::new(config.sampling.window()),
            inspector: HostInspector::new(&config.system),
            sampler: SamplerState::new(),
            shutdown,
            config,
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("history_len", &self.history.len())
            .field("config", &self.config)
            .field("sampler", &self.sampler)
            .finish_non_exhaustive()
    }
}

/// Lifecycle phase of the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SamplerPhase {
    /// Waiting for the next tick.
    Idle = 0,
    /// Reading the sensors or storing the result.
    Sampling = 1,
    /// Waiting to retry after a failed read.
    Backoff = 2,
    /// Cancelled; no further samples.
    Stopped = 3,
}

impl SamplerPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SamplerPhase::Idle,
            1 => SamplerPhase::Sampling,
            2 => SamplerPhase::Backoff,
            _ => SamplerPhase::Stopped,
        }
    }
}

/// Sampler health counters.
#[derive(Debug)]
pub struct SamplerState {
    phase: AtomicU8,
    consecutive_failures: AtomicU32,
    total_samples: AtomicU64,
    total_failures: AtomicU64,
    /// Unix time of the last successful sample (0 = never).
    last_success: AtomicI64,
    log_ok: AtomicBool,
    last_error: RwLock<Option<String>>,
    log_path: RwLock<Option<PathBuf>>,
    log_error: RwLock<Option<String>>,
}

impl SamplerState {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(SamplerPhase::Idle as u8),
            consecutive_failures: AtomicU32::new(0),
            total_samples: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            last_success: AtomicI64::new(0),
            log_ok: AtomicBool::new(true),
            last_error: RwLock::new(None),
            log_path: RwLock::new(None),
            log_error: RwLock::new(None),
        }
    }

    pub fn phase(&self) -> SamplerPhase {
        SamplerPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    pub fn set_phase(&self, phase: SamplerPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples.load(Ordering::SeqCst)
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::SeqCst)
    }

    /// Record a successful sample. Returns the failure streak it ended.
    pub fn record_success(&self, at: OffsetDateTime) -> u32 {
        self.total_samples.fetch_add(1, Ordering::SeqCst);
        self.last_success.store(at.unix_timestamp(), Ordering::SeqCst);
        self.consecutive_failures.swap(0, Ordering::SeqCst)
    }

    /// Record a failed read. Returns the new consecutive failure count.
    pub async fn record_failure(&self, error: &str) -> u32 {
        self.total_failures.fetch_add(1, Ordering::SeqCst);
        *self.last_error.write().await = Some(error.to_string());
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Time of the last successful sample.
    pub fn last_success(&self) -> Option<OffsetDateTime> {
        match self.last_success.load(Ordering::SeqCst) {
            0 => None,
            ts => OffsetDateTime::from_unix_timestamp(ts).ok(),
        }
    }

    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    pub fn log_ok(&self) -> bool {
        self.log_ok.load(Ordering::SeqCst)
    }

    pub async fn set_log_path(&self, path: Option<&Path>) {
        *self.log_path.write().await = path.map(Path::to_path_buf);
    }

    /// Mark the session log healthy. Returns whether it was failing before.
    pub async fn set_log_ok(&self) -> bool {
        let was_ok = self.log_ok.swap(true, Ordering::SeqCst);
        if !was_ok {
            *self.log_error.write().await = None;
        }
        !was_ok
    }

    /// Mark the session log failing. Returns whether it was healthy before.
    pub async fn set_log_error(&self, error: &str) -> bool {
        *self.log_error.write().await = Some(error.to_string());
        self.log_ok.swap(false, Ordering::SeqCst)
    }

    /// Point-in-time copy for status responses.
    pub async fn snapshot(&self) -> SamplerStatus {
        SamplerStatus {
            state: self.phase(),
            consecutive_failures: self.consecutive_failures(),
            total_samples: self.total_samples(),
            total_failures: self.total_failures(),
            last_error: self.last_error().await,
            last_success: self.last_success(),
            log_ok: self.log_ok(),
            log_path: self.log_path.read().await.clone(),
            log_error: self.log_error.read().await.clone(),
        }
    }
}

impl Default for SamplerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable sampler health.
#[derive(Debug, Clone, Serialize)]
pub struct SamplerStatus {
    pub state: SamplerPhase,
    pub consecutive_failures: u32,
    pub total_samples: u64,
    pub total_failures: u64,
    /// Most recent sensor error, kept after recovery.
    pub last_error: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_success: Option<OffsetDateTime>,
    pub log_ok: bool,
    pub log_path: Option<PathBuf>,
    pub log_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::ProcessShutdown;
    use tokio_util::sync::CancellationToken;

    fn create_test_state() -> Arc<AppState> {
        let shutdown = Arc::new(ProcessShutdown::new(CancellationToken::new()));
        AppState::new(Config::default(), shutdown)
    }

    #[test]
    fn test_app_state_new() {
        let state = create_test_state();
        assert_eq!(state.config.server.bind, "0.0.0.0:5000");
        assert_eq!(state.history.window(), state.config.sampling.window());
        assert!(state.history.is_empty());
        assert_eq!(state.sampler.phase(), SamplerPhase::Idle);
    }

    #[test]
    fn test_app_state_debug() {
        let debug = format!("{:?}", create_test_state());
        assert!(debug.contains("AppState"));
        assert!(debug.contains("history_len"));
    }

    #[test]
    fn test_phase_round_trip() {
        let sampler = SamplerState::new();
        for phase in [
            SamplerPhase::Idle,
            SamplerPhase::Sampling,
            SamplerPhase::Backoff,
            SamplerPhase::Stopped,
        ] {
            sampler.set_phase(phase);
            assert_eq!(sampler.phase(), phase);
        }
    }

    #[tokio::test]
    async fn test_failure_streak_and_recovery() {
        let sampler = SamplerState::new();
        assert!(sampler.last_success().is_none());

        assert_eq!(sampler.record_failure("timed out").await, 1);
        assert_eq!(sampler.record_failure("timed out").await, 2);
        assert_eq!(sampler.consecutive_failures(), 2);
        assert_eq!(sampler.last_error().await.as_deref(), Some("timed out"));

        let now = OffsetDateTime::now_utc();
        assert_eq!(sampler.record_success(now), 2);
        assert_eq!(sampler.consecutive_failures(), 0);
        assert_eq!(sampler.total_samples(), 1);
        assert_eq!(sampler.total_failures(), 2);
        assert_eq!(
            sampler.last_success().unwrap().unix_timestamp(),
            now.unix_timestamp()
        );
        // The last error stays visible after recovery.
        assert!(sampler.last_error().await.is_some());
    }

    #[tokio::test]
    async fn test_log_status_transitions() {
        let sampler = SamplerState::new();
        assert!(sampler.log_ok());

        assert!(sampler.set_log_error("disk full").await);
        assert!(!sampler.set_log_error("disk full").await);
        assert!(!sampler.log_ok());
        let status = sampler.snapshot().await;
        assert_eq!(status.log_error.as_deref(), Some("disk full"));

        assert!(sampler.set_log_ok().await);
        assert!(!sampler.set_log_ok().await);
        assert!(sampler.snapshot().await.log_error.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_serialization() {
        let sampler = SamplerState::new();
        sampler.set_phase(SamplerPhase::Backoff);
        sampler.set_log_path(Some(Path::new("/tmp/session.csv"))).await;
        sampler.record_failure("particulate sensor read failed").await;

        let json = serde_json::to_value(sampler.snapshot().await).unwrap();
        assert_eq!(json["state"], "backoff");
        assert_eq!(json["consecutive_failures"], 1);
        assert_eq!(json["total_failures"], 1);
        assert_eq!(json["log_ok"], true);
        assert_eq!(json["log_path"], "/tmp/session.csv");
        assert!(json["last_success"].is_null());
    }
}
