//! Background sampler.
//!
//! One task owns the sensors and the session log. Each tick it reads both
//! sensors, appends the reading to the shared history and writes a CSV row.
//! Failed reads are retried with backoff until one succeeds; the regular
//! cadence then restarts from the successful sample.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use airmon_core::{Backoff, SensorReader};
use airmon_store::SessionLogger;
use airmon_types::Reading;

use crate::state::{AppState, SamplerPhase};

/// Periodic sensor sampler.
pub struct Sampler {
    state: Arc<AppState>,
    reader: SensorReader,
    logger: Option<SessionLogger>,
    backoff: Backoff,
    interval: Duration,
    token: CancellationToken,
}

impl Sampler {
    /// Create a sampler. Interval and backoff come from the state's config.
    ///
    /// Without a `logger` readings are only kept in memory.
    pub fn new(
        state: Arc<AppState>,
        reader: SensorReader,
        logger: Option<SessionLogger>,
        token: CancellationToken,
    ) -> Self {
        let sampling = &state.config.sampling;
        let interval = sampling.interval();
        let backoff = Backoff::new(sampling.backoff.to_backoff_config());
        Self {
            state,
            reader,
            logger,
            backoff,
            interval,
            token,
        }
    }

    /// Run the sampler on its own task until the token is cancelled.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Sample until cancelled, then close the session log.
    pub async fn run(mut self) {
        let (particulate, climate) = self.reader.sensor_names();
        info!(
            "Starting sampler ({} + {}, interval: {}s)",
            particulate,
            climate,
            self.interval.as_secs()
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        'outer: loop {
            self.state.sampler.set_phase(SamplerPhase::Idle);
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let mut retrying = false;
            loop {
                self.state.sampler.set_phase(SamplerPhase::Sampling);
                let result = tokio::select! {
                    biased;
                    _ = self.token.cancelled() => break 'outer,
                    result = self.reader.read() => result,
                };

                match result {
                    Ok(reading) => {
                        self.store(reading).await;
                        self.backoff.reset();
                        if retrying {
                            ticker.reset();
                        }
                        break;
                    }
                    Err(e) => {
                        let failures = self.state.sampler.record_failure(&e.to_string()).await;
                        if failures <= 3 {
                            warn!("Sensor read failed: {} (attempt {})", e, failures);
                        } else if failures == 4 {
                            error!(
                                failures,
                                "Sensor read keeps failing, will continue trying silently"
                            );
                        }

                        self.state.sampler.set_phase(SamplerPhase::Backoff);
                        let delay = self.backoff.next_delay();
                        debug!("Retrying in {:?}", delay);
                        tokio::select! {
                            biased;
                            _ = self.token.cancelled() => break 'outer,
                            _ = sleep(delay) => {}
                        }
                        retrying = true;
                    }
                }
            }
        }

        self.state.sampler.set_phase(SamplerPhase::Stopped);
        if let Some(logger) = self.logger.take()
            && let Err(e) = logger.close()
        {
            warn!("Failed to close session log: {}", e);
        }
        info!("Sampler stopped");
    }

    /// Publish a reading to the history, then the session log.
    ///
    /// A reading the history rejects is neither logged nor counted.
    async fn store(&mut self, reading: Reading) {
        if let Err(e) = self.state.history.append(reading.clone()) {
            warn!("Dropped reading: {}", e);
            return;
        }

        if let Some(logger) = self.logger.as_mut() {
            match logger.append(&reading) {
                Ok(()) => {
                    if self.state.sampler.set_log_ok().await {
                        info!("Session log writable again");
                    }
                }
                Err(e) => {
                    if self.state.sampler.set_log_error(&e.to_string()).await {
                        warn!("Failed to write session log: {}", e);
                    }
                }
            }
        }

        let streak = self.state.sampler.record_success(reading.captured_at());
        if streak > 0 {
            info!("Sensors recovered after {} failed read(s)", streak);
        }
        debug!(
            pm2_5 = reading.pm2_5(),
            temp_c = reading.temperature_c(),
            "Sampled reading"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use airmon_core::{Clock, MockClimateSensor, MockParticulateSensor};
    use airmon_types::{ClimateSample, ParticulateSample, Timestamp};
    use tempfile::TempDir;

    use super::*;
    use crate::config::{BackoffSettings, Config};
    use crate::shutdown::ProcessShutdown;

    fn create_test_state(config: Config) -> Arc<AppState> {
        let shutdown = Arc::new(ProcessShutdown::new(CancellationToken::new()));
        AppState::new(config, shutdown)
    }

    fn fixed_backoff_config() -> Config {
        let mut config = Config::default();
        config.sampling.backoff = BackoffSettings {
            initial_delay_ms: 1000,
            max_delay_ms: 1000,
            multiplier: 1.0,
            jitter: false,
        };
        config
    }

    fn reader(pm: &Arc<MockParticulateSensor>, climate: &Arc<MockClimateSensor>) -> SensorReader {
        SensorReader::new(pm.clone(), climate.clone(), Clock::new())
    }

    fn open_logger(dir: &TempDir) -> (SessionLogger, PathBuf) {
        let logger = SessionLogger::open(dir.path(), time::OffsetDateTime::now_utc()).unwrap();
        let path = logger.path().to_path_buf();
        (logger, path)
    }

    /// Sink that rejects writes while `fail` is set.
    #[derive(Clone, Default)]
    struct FlakyWriter {
        fail: Arc<AtomicBool>,
        written: Arc<Mutex<Vec<u8>>>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(io::Error::other("disk full"));
            }
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl FlakyWriter {
        fn lines(&self) -> usize {
            String::from_utf8(self.written.lock().unwrap().clone())
                .unwrap()
                .lines()
                .count()
        }
    }

    fn monotonic_secs(state: &AppState) -> Vec<u64> {
        state
            .history
            .history()
            .iter()
            .map(|r| r.timestamp().monotonic.as_secs())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_on_interval() {
        let dir = TempDir::new().unwrap();
        let (logger, path) = open_logger(&dir);
        let state = create_test_state(Config::default());
        let pm = Arc::new(MockParticulateSensor::new(3.0, 8.0, 12.0));
        let climate = Arc::new(MockClimateSensor::new(21.0, 40.0));
        let token = CancellationToken::new();

        let handle = Sampler::new(
            Arc::clone(&state),
            reader(&pm, &climate),
            Some(logger),
            token.clone(),
        )
        .spawn();

        sleep(Duration::from_millis(10_500)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(monotonic_secs(&state), vec![0, 5, 10]);
        assert_eq!(state.sampler.total_samples(), 3);
        assert_eq!(state.sampler.phase(), SamplerPhase::Stopped);
        assert!(state.sampler.log_ok());

        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 4);
        assert!(content.starts_with("time_iso,"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_resumes_cadence() {
        let state = create_test_state(fixed_backoff_config());
        let pm = Arc::new(MockParticulateSensor::new(3.0, 8.0, 12.0));
        let climate = Arc::new(MockClimateSensor::new(21.0, 40.0));
        pm.fail_next(2);
        let token = CancellationToken::new();

        let handle =
            Sampler::new(Arc::clone(&state), reader(&pm, &climate), None, token.clone()).spawn();

        sleep(Duration::from_millis(7_500)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(monotonic_secs(&state), vec![2, 7]);
        assert_eq!(state.sampler.total_failures(), 2);
        assert_eq!(state.sampler.consecutive_failures(), 0);
        assert!(state.sampler.last_error().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let dir = TempDir::new().unwrap();
        let (logger, path) = open_logger(&dir);
        let state = create_test_state(fixed_backoff_config());
        let pm = Arc::new(MockParticulateSensor::new(3.0, 8.0, 12.0));
        let climate = Arc::new(MockClimateSensor::new(21.0, 40.0));
        climate.set_should_fail(true);
        let token = CancellationToken::new();

        let handle = Sampler::new(
            Arc::clone(&state),
            reader(&pm, &climate),
            Some(logger),
            token.clone(),
        )
        .spawn();

        sleep(Duration::from_millis(500)).await;
        assert_eq!(state.sampler.phase(), SamplerPhase::Backoff);
        token.cancel();
        handle.await.unwrap();

        assert_eq!(state.sampler.phase(), SamplerPhase::Stopped);
        assert!(state.history.is_empty());
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_hung_read() {
        let mut config = Config::default();
        config.sampling.read_timeout_ms = 60_000;
        let state = create_test_state(config);
        let pm = Arc::new(MockParticulateSensor::new(3.0, 8.0, 12.0));
        let climate = Arc::new(MockClimateSensor::new(21.0, 40.0));
        pm.set_latency(Duration::from_secs(30));
        let token = CancellationToken::new();

        let reader = reader(&pm, &climate).with_timeout(state.config.sampling.read_timeout());
        let handle = Sampler::new(Arc::clone(&state), reader, None, token.clone()).spawn();

        sleep(Duration::from_secs(1)).await;
        assert_eq!(state.sampler.phase(), SamplerPhase::Sampling);
        token.cancel();
        handle.await.unwrap();

        assert_eq!(state.sampler.phase(), SamplerPhase::Stopped);
        assert_eq!(state.sampler.total_samples(), 0);
        assert_eq!(state.sampler.total_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_read_keeps_interval_between_samples() {
        let state = create_test_state(Config::default());
        let pm = Arc::new(MockParticulateSensor::new(3.0, 8.0, 12.0));
        let climate = Arc::new(MockClimateSensor::new(21.0, 40.0));
        pm.set_latency(Duration::from_millis(1900));
        let token = CancellationToken::new();

        let handle =
            Sampler::new(Arc::clone(&state), reader(&pm, &climate), None, token.clone()).spawn();

        sleep(Duration::from_secs(2)).await;
        pm.set_latency(Duration::ZERO);
        sleep(Duration::from_millis(3_500)).await;
        token.cancel();
        handle.await.unwrap();

        let stamps: Vec<Duration> = state
            .history
            .history()
            .iter()
            .map(|r| r.timestamp().monotonic)
            .collect();
        assert_eq!(stamps, vec![Duration::ZERO, Duration::from_secs(5)]);
        assert!(stamps.windows(2).all(|w| w[1] - w[0] >= Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_failure_keeps_sampling_and_recovers() {
        let sink = FlakyWriter::default();
        let logger = SessionLogger::from_writer(sink.clone(), "session.csv").unwrap();
        sink.fail.store(true, Ordering::SeqCst);
        let state = create_test_state(Config::default());
        let pm = Arc::new(MockParticulateSensor::new(3.0, 8.0, 12.0));
        let climate = Arc::new(MockClimateSensor::new(21.0, 40.0));
        let token = CancellationToken::new();

        let handle = Sampler::new(
            Arc::clone(&state),
            reader(&pm, &climate),
            Some(logger),
            token.clone(),
        )
        .spawn();

        sleep(Duration::from_millis(5_500)).await;
        assert_eq!(state.history.len(), 2);
        assert_eq!(state.sampler.total_samples(), 2);
        assert!(!state.sampler.log_ok());
        let status = state.sampler.snapshot().await;
        assert!(status.log_error.unwrap().contains("disk full"));
        assert_eq!(sink.lines(), 1);

        sink.fail.store(false, Ordering::SeqCst);
        sleep(Duration::from_secs(5)).await;
        assert_eq!(state.history.len(), 3);
        assert!(state.sampler.log_ok());
        assert!(state.sampler.snapshot().await.log_error.is_none());
        // Rows buffered during the outage are written with the next one.
        assert_eq!(sink.lines(), 4);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_reading_is_not_logged() {
        let dir = TempDir::new().unwrap();
        let (logger, path) = open_logger(&dir);
        let state = create_test_state(Config::default());
        let future = Reading::new(
            Timestamp::new(time::OffsetDateTime::now_utc(), Duration::from_secs(3600)),
            ClimateSample::new(21.0, 40.0),
            ParticulateSample::new(3.0, 8.0, 12.0),
        )
        .unwrap();
        state.history.append(future).unwrap();
        let pm = Arc::new(MockParticulateSensor::new(3.0, 8.0, 12.0));
        let climate = Arc::new(MockClimateSensor::new(21.0, 40.0));
        let token = CancellationToken::new();

        let handle = Sampler::new(
            Arc::clone(&state),
            reader(&pm, &climate),
            Some(logger),
            token.clone(),
        )
        .spawn();

        sleep(Duration::from_millis(500)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(state.history.len(), 1);
        assert_eq!(state.sampler.total_samples(), 0);
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
