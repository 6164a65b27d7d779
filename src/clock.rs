//! Time sources for rolling windows
//!
//! [`RollingStats`](crate::statistics::RollingStats) rotates its segments
//! based on the time observed at each call. The time source is injectable so
//! rotation can be driven deterministically in tests.
//!
//! # Example
//!
//! ```
//! use rollstats::clock::ManualClock;
//! use rollstats::statistics::RollingStats;
//!
//! let clock = ManualClock::new();
//! let stats = RollingStats::with_clock(100, 50, clock.clone()).unwrap();
//!
//! stats.add(1.0);
//! clock.advance(200);
//! assert_eq!(stats.window_stats().n(), 0);
//! assert_eq!(stats.cumulative_stats().n(), 1);
//! ```

use core::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

/// A source of wall-clock time
pub trait Clock: Send + Sync + Debug {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
///
/// Clones share the same offset, so a test can keep one handle and give
/// another to the structure under test.
#[derive(Clone, Debug)]
pub struct ManualClock {
    origin: DateTime<Utc>,
    offset_ms: Arc<AtomicI64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Create a clock frozen at the current system time
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Create a clock frozen at `origin`
    pub fn starting_at(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            offset_ms: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Move the clock forward by `millis`
    pub fn advance(&self, millis: i64) {
        self.offset_ms.fetch_add(millis, Ordering::SeqCst);
    }

    /// Place the clock `millis` after its origin
    pub fn set(&self, millis: i64) {
        self.offset_ms.store(millis, Ordering::SeqCst);
    }

    /// Milliseconds elapsed since the origin
    pub fn elapsed(&self) -> i64 {
        self.offset_ms.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.origin + Duration::milliseconds(self.elapsed())
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Whole milliseconds from `earlier` to `later`, or 0 if the clock went backwards
pub(crate) fn millis_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> u64 {
    u64::try_from((later - earlier).num_milliseconds()).unwrap_or(0)
}
