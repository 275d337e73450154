//! Rolling, time-windowed history of recent readings.

use std::collections::VecDeque;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tracing::trace;

use airmon_types::Reading;

use crate::error::{Error, Result};

/// Default retention window (15 minutes).
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Thread-safe ring of readings covering the last `window` of time.
///
/// There is one writer (the sampler) and any number of readers. Readers get
/// value copies, so nothing outside the store can observe a half-applied
/// append. Eviction is relative to the newest reading's monotonic
/// timestamp and happens on append.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use airmon_store::HistoryStore;
/// use airmon_types::{ClimateSample, ParticulateSample, Reading, Timestamp};
/// use time::OffsetDateTime;
///
/// let store = HistoryStore::new(Duration::from_secs(60));
/// assert!(store.latest().is_none());
///
/// let reading = Reading::new(
///     Timestamp::new(OffsetDateTime::now_utc(), Duration::from_secs(1)),
///     ClimateSample::new(20.0, 40.0),
///     ParticulateSample::new(1.0, 4.0, 6.0),
/// )?;
/// store.append(reading)?;
/// assert_eq!(store.history().len(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct HistoryStore {
    window: Duration,
    readings: RwLock<VecDeque<Reading>>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl HistoryStore {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            readings: RwLock::new(VecDeque::new()),
        }
    }

    /// Retention window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Append a reading and evict everything older than the window.
    ///
    /// Returns [`Error::OutOfOrder`] without modifying the store if the
    /// reading is not strictly newer than the current latest reading.
    pub fn append(&self, reading: Reading) -> Result<()> {
        let newest = reading.timestamp();
        let mut readings = self.write();

        if let Some(tail) = readings.back() {
            let latest = tail.timestamp().monotonic;
            if newest.monotonic <= latest {
                return Err(Error::OutOfOrder {
                    latest,
                    attempted: newest.monotonic,
                });
            }
        }

        readings.push_back(reading);

        let before = readings.len();
        while readings
            .front()
            .is_some_and(|oldest| newest.since(&oldest.timestamp()) > self.window)
        {
            readings.pop_front();
        }
        let evicted = before - readings.len();
        if evicted > 0 {
            trace!(evicted, retained = readings.len(), "Evicted readings");
        }

        Ok(())
    }

    /// Most recent reading, or `None` before the first sample.
    pub fn latest(&self) -> Option<Reading> {
        self.read().back().cloned()
    }

    /// Snapshot of the retained readings, oldest first.
    pub fn history(&self) -> Vec<Reading> {
        self.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop all retained readings.
    pub fn clear(&self) {
        self.write().clear();
    }

    // A panic while holding the lock cannot leave the deque half-updated,
    // so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, VecDeque<Reading>> {
        self.readings.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, VecDeque<Reading>> {
        self.readings.write().unwrap_or_else(|e| e.into_inner())
    }
}
