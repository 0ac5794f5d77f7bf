//! Shared helpers for the integration suites.

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use fibersync::runtime::TaskInput;
use fibersync::unit::suspend;
use fibersync::{Error, SchedulerConfig};

pub use fibersync::test_utils::init_test_logging;

/// Initializes logging and announces the test.
pub fn init_test(name: &str) {
    init_test_logging();
    fibersync::test_phase!(name);
}

/// Scheduler configuration without any pauses between passes or attempts.
pub fn quiet() -> SchedulerConfig {
    SchedulerConfig::new().without_delays()
}

/// A task that suspends `suspensions` times and then returns `value`.
pub fn stepping<T: 'static>(suspensions: u32, value: T) -> TaskInput<T> {
    TaskInput::new(move || async move {
        for _ in 0..suspensions {
            suspend().await?;
        }
        Ok::<_, Error>(value)
    })
}

/// A task that suspends `suspensions` times, then claims the next ordinal
/// from `clock` and returns it.
pub fn ordinal(suspensions: u32, clock: Rc<Cell<usize>>) -> TaskInput<usize> {
    TaskInput::new(move || async move {
        for _ in 0..suspensions {
            suspend().await?;
        }
        let n = clock.get();
        clock.set(n + 1);
        Ok::<_, Error>(n)
    })
}
