//! Time: clocks, cooperative sleeps and one-shot timers.
//!
//! - [`TimeSource`], [`WallClock`], [`VirtualClock`]: where deadlines are
//!   measured
//! - [`sleep`], [`sleep_on`]: suspension-based waits inside a unit
//! - [`timeout`], [`set_timeout`]: deferred callbacks

mod sleep;
mod source;

pub use sleep::{set_timeout, sleep, sleep_on, timeout};
pub use source::{TimeSource, VirtualClock, WallClock};
