//! Process clock producing [`Timestamp`]s.

use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::Instant;

use airmon_types::Timestamp;

/// Pairs a monotonic origin with the wall-clock time it was taken at.
///
/// Monotonic offsets come from [`tokio::time::Instant`], so they follow the
/// paused test clock when tokio's `test-util` is enabled.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
    started_at: OffsetDateTime,
}

impl Clock {
    /// Start a clock at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            started_at: OffsetDateTime::now_utc(),
        }
    }

    /// Current timestamp.
    pub fn now(&self) -> Timestamp {
        Timestamp::new(OffsetDateTime::now_utc(), self.origin.elapsed())
    }

    /// Wall-clock time the clock was started.
    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    /// Monotonic time since the clock was started.
    pub fn uptime(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_monotonic_follows_paused_clock() {
        let clock = Clock::new();
        let first = clock.now();
        tokio::time::advance(Duration::from_secs(5)).await;
        let second = clock.now();
        assert_eq!(second.since(&first), Duration::from_secs(5));
        assert!(second > first);
        assert_eq!(clock.uptime(), Duration::from_secs(5));
    }

    #[test]
    fn test_started_at_is_recent() {
        let clock = Clock::default();
        let age = OffsetDateTime::now_utc() - clock.started_at();
        assert!(age.whole_seconds() < 5);
    }
}
