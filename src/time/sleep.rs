//! Cooperative sleeps and one-shot timers.
//!
//! These never block the thread. [`sleep`] parks the current unit at a
//! suspension point on every attempt until its deadline passes, so it only
//! makes progress while something keeps resuming that unit.

use std::time::Duration;

use crate::error::{BoxError, Error, Result};
use crate::runtime::Driver;
use crate::unit::{Unit, in_unit, suspend};

use super::{TimeSource, WallClock};

/// Poll delay used by [`set_timeout`] while it waits for its timer.
const TIMER_POLL_DELAY: Duration = Duration::from_millis(1);

/// Suspends the current unit until `duration` has passed on the wall clock.
///
/// Must be awaited inside a running unit; elsewhere it fails with
/// [`ErrorKind::NoCurrentUnit`](crate::ErrorKind::NoCurrentUnit) without
/// waiting. A zero duration still suspends once.
pub async fn sleep(duration: Duration) -> Result<()> {
    sleep_on(&WallClock::new(), duration).await
}

/// Like [`sleep`], measuring the deadline on `clock`.
pub async fn sleep_on(clock: &dyn TimeSource, duration: Duration) -> Result<()> {
    if !in_unit() {
        return Err(Error::no_current_unit().with_context("sleep outside a unit"));
    }
    let deadline = clock.now().saturating_add(duration);
    loop {
        suspend().await?;
        if clock.now() >= deadline {
            return Ok(());
        }
    }
}

/// Builds a unit that runs `callback` once `delay` has elapsed.
///
/// The delay only elapses while the caller drives the unit: nothing fires
/// until it is started, and it fires on the first resume at or past the
/// deadline. Dropping the unit cancels the callback.
pub fn timeout<T, F, E>(callback: F, delay: Duration) -> Unit<T>
where
    T: 'static,
    F: FnOnce() -> std::result::Result<T, E> + 'static,
    E: Into<BoxError> + 'static,
{
    Driver::new().timeout_unit(callback, delay)
}

/// Runs `callback` after `delay`, blocking until it has fired, and returns
/// its value.
pub fn set_timeout<T, F, E>(callback: F, delay: Duration) -> Result<T>
where
    T: 'static,
    F: FnOnce() -> std::result::Result<T, E> + 'static,
    E: Into<BoxError> + 'static,
{
    Driver::new()
        .poll_delay(TIMER_POLL_DELAY)
        .set_timeout(callback, delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::VirtualClock;
    use crate::unit::Step;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Arc;

    #[test]
    fn sleep_outside_unit_fails_fast() {
        crate::test_utils::init_test_logging();
        crate::test_phase!("sleep_outside_unit_fails_fast");
        let started = std::time::Instant::now();
        let result = futures_lite::future::block_on(sleep(Duration::from_secs(5)));
        let err = result.expect_err("no unit");
        assert_eq!(err.kind(), crate::ErrorKind::NoCurrentUnit);
        assert!(started.elapsed() < Duration::from_secs(1));
        crate::test_complete!("sleep_outside_unit_fails_fast");
    }

    #[test]
    fn sleep_on_virtual_clock_suspends_until_deadline() {
        crate::test_utils::init_test_logging();
        crate::test_phase!("sleep_on_virtual_clock_suspends_until_deadline");
        let clock = Arc::new(VirtualClock::new());
        let inner = Arc::clone(&clock);
        let mut unit = Unit::new(move || async move {
            sleep_on(inner.as_ref(), Duration::from_secs(2)).await?;
            Ok::<_, Error>("awake")
        });

        assert!(matches!(unit.start(), Ok(Step::Suspended(None))));
        clock.advance(Duration::from_secs(1));
        assert!(matches!(unit.resume(), Ok(Step::Suspended(None))));
        clock.advance(Duration::from_secs(1));
        assert!(unit.resume().expect("resume").is_terminated());
        assert_eq!(unit.take_return().ok(), Some("awake"));
        crate::test_complete!("sleep_on_virtual_clock_suspends_until_deadline");
    }

    #[test]
    fn zero_sleep_still_yields_once() {
        let mut unit = Unit::new(|| async {
            sleep(Duration::ZERO).await?;
            Ok::<_, Error>(())
        });
        assert!(matches!(unit.start(), Ok(Step::Suspended(None))));
        assert!(unit.resume().expect("resume").is_terminated());
    }

    #[test]
    fn dropped_timeout_never_fires() {
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        let unit = timeout(
            move || {
                flag.set(true);
                Ok::<_, BoxError>(())
            },
            Duration::ZERO,
        );
        drop(unit);
        assert!(!fired.get());
    }

    #[test]
    fn set_timeout_returns_callback_value() {
        crate::test_utils::init_test_logging();
        crate::test_phase!("set_timeout_returns_callback_value");
        let started = std::time::Instant::now();
        let value = set_timeout(|| Ok::<_, BoxError>("late"), Duration::from_millis(10))
            .expect("fires");
        assert_eq!(value, "late");
        assert!(started.elapsed() >= Duration::from_millis(10));
        crate::test_complete!("set_timeout_returns_callback_value");
    }
}
