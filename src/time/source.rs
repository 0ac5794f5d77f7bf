//! Time sources used for deadlines and cooperative sleeps.
//!
//! Timeouts and sleeps read the clock through [`TimeSource`] so they work
//! against both the wall clock (production) and a manually advanced
//! [`VirtualClock`] (tests).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[inline]
fn duration_to_nanos_saturating(duration: Duration) -> u64 {
    duration.as_nanos().min(u128::from(u64::MAX)) as u64
}

/// Time source abstraction for getting the current time.
pub trait TimeSource: Send + Sync {
    /// Returns the time elapsed since the source's epoch.
    fn now(&self) -> Duration;
}

/// Monotonic wall clock whose epoch is its creation instant.
#[derive(Debug)]
pub struct WallClock {
    epoch: Instant,
}

impl WallClock {
    /// Creates a new wall clock time source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for WallClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// Virtual time source for deterministic tests.
///
/// Time only moves when [`advance`](Self::advance) or
/// [`advance_to`](Self::advance_to) is called.
///
/// ```
/// use fibersync::time::{TimeSource, VirtualClock};
/// use std::time::Duration;
///
/// let clock = VirtualClock::new();
/// assert_eq!(clock.now(), Duration::ZERO);
///
/// clock.advance(Duration::from_millis(1500));
/// assert_eq!(clock.now(), Duration::from_millis(1500));
/// ```
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: AtomicU64,
}

impl VirtualClock {
    /// Creates a new virtual clock starting at time zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: AtomicU64::new(0),
        }
    }

    /// Creates a virtual clock starting at the given offset.
    #[must_use]
    pub fn starting_at(offset: Duration) -> Self {
        Self {
            now: AtomicU64::new(duration_to_nanos_saturating(offset)),
        }
    }

    /// Advances time by `step`.
    pub fn advance(&self, step: Duration) {
        self.now
            .fetch_add(duration_to_nanos_saturating(step), Ordering::AcqRel);
    }

    /// Advances time to `target`. Never moves backwards.
    pub fn advance_to(&self, target: Duration) {
        self.now
            .fetch_max(duration_to_nanos_saturating(target), Ordering::AcqRel);
    }
}

impl TimeSource for VirtualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.now.load(Ordering::Acquire))
    }
}
