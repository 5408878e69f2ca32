//! Injectable time sources.
//!
//! The adapter stamps `started_at`/`completed_at` through a [`Clock`] so the
//! reducer itself never reads the wall clock.

use chrono::{Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

use super::Timestamp;

/// A source of timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A deterministic clock for tests.
///
/// Every call to [`Clock::now`] returns the current reading and then advances
/// it by the configured tick, so consecutive readings are strictly increasing
/// unless the tick is zero.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
    tick_ms: i64,
}

impl ManualClock {
    /// Creates a clock starting at `start` that advances `tick_ms` per reading.
    #[must_use]
    pub fn new(start: Timestamp, tick_ms: i64) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
            tick_ms,
        }
    }

    /// A clock starting at the Unix epoch, ticking one millisecond per reading.
    #[must_use]
    pub fn ticking() -> Self {
        Self::new(Utc.timestamp_millis_opt(0).single().unwrap_or_default(), 1)
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }

    /// Returns the current reading without advancing.
    #[must_use]
    pub fn peek(&self) -> Timestamp {
        from_millis(self.millis.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        from_millis(self.millis.fetch_add(self.tick_ms, Ordering::SeqCst))
    }
}

fn from_millis(millis: i64) -> Timestamp {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}
