//! Driving single units to completion.
//!
//! A [`Driver`] repeatedly starts or resumes one unit until it terminates,
//! optionally bounded by a timeout. Two flavours share the same loop:
//!
//! - [`drive`](Driver::drive) blocks the calling thread, sleeping
//!   `poll_delay` between attempts;
//! - [`drive_cooperative`](Driver::drive_cooperative) is itself async and
//!   suspends the *enclosing* unit between attempts, so sibling units under
//!   the same scheduler keep making progress.
//!
//! A timeout never terminates the driven unit. It is left suspended and can
//! be resumed again by whoever still owns it.
//!
//! # Blocking versus cooperative awaits
//!
//! [`await_task`] and [`await_promise`] block the calling thread. Called
//! from inside a scheduled task they stall every sibling until the awaited
//! task finishes. Tasks should use [`await_cooperative`] and
//! [`await_promise_cooperative`] instead, which suspend the calling task
//! between attempts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{DEFAULT_AWAIT_POLL_DELAY, SchedulerConfig};
use crate::error::{BoxError, Error, Result};
use crate::time::{TimeSource, WallClock, sleep_on};
use crate::tracing_compat::{debug, trace, warn};
use crate::unit::{Step, Unit, in_unit, suspend};

use super::promise::Promise;
use super::task::TaskInput;

/// Drives individual units to termination.
#[derive(Clone)]
pub struct Driver {
    clock: Arc<dyn TimeSource>,
    poll_delay: Duration,
    timeout: Option<Duration>,
}

impl Driver {
    /// Creates a driver on the wall clock with the default poll delay and
    /// no timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clock: Arc::new(WallClock::new()),
            poll_delay: DEFAULT_AWAIT_POLL_DELAY,
            timeout: None,
        }
    }

    /// Creates a driver using the await settings of `config`.
    #[must_use]
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new()
            .poll_delay(config.await_poll_delay)
            .timeout(config.await_timeout)
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the pause between attempts of a blocking drive.
    #[must_use]
    pub const fn poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    /// Sets the timeout. `None` waits forever.
    #[must_use]
    pub const fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the time source.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn TimeSource> {
        &self.clock
    }

    /// Advances a unit by one step: start it if new, resume it if
    /// suspended. A unit that already finished reports `Terminated`.
    pub fn advance<T>(unit: &mut Unit<T>) -> Result<Step> {
        if unit.is_terminated() {
            Ok(Step::Terminated)
        } else if unit.is_started() {
            unit.resume()
        } else {
            unit.start()
        }
    }

    /// Drives `unit` to termination, blocking between attempts.
    ///
    /// Fails with [`ErrorKind::DeadlineExceeded`](crate::ErrorKind::DeadlineExceeded)
    /// when the timeout elapses first; the unit is left as it was.
    pub fn drive<T>(&self, unit: &mut Unit<T>) -> Result<T> {
        let started = self.clock.now();
        loop {
            if Self::advance(unit)?.is_terminated() {
                return unit.take_return();
            }
            self.check_deadline(started)?;
            if !self.poll_delay.is_zero() {
                std::thread::sleep(self.poll_delay);
            }
        }
    }

    /// Drives `unit` to termination from inside another unit, suspending
    /// the enclosing unit between attempts.
    ///
    /// Outside a unit this fails with
    /// [`ErrorKind::NoCurrentUnit`](crate::ErrorKind::NoCurrentUnit) as soon
    /// as the driven unit needs a second attempt.
    pub async fn drive_cooperative<T>(&self, unit: &mut Unit<T>) -> Result<T> {
        let started = self.clock.now();
        loop {
            if Self::advance(unit)?.is_terminated() {
                return unit.take_return();
            }
            self.check_deadline(started)?;
            suspend().await?;
        }
    }

    fn check_deadline(&self, started: Duration) -> Result<()> {
        let Some(timeout) = self.timeout else {
            return Ok(());
        };
        let elapsed = self.clock.now().saturating_sub(started);
        if elapsed >= timeout {
            warn!(?timeout, ?elapsed, "await deadline exceeded");
            return Err(Error::deadline_exceeded(timeout, elapsed));
        }
        Ok(())
    }

    /// Drives a task to termination and returns its value.
    ///
    /// This blocks the thread. Inside a running unit, prefer
    /// [`await_cooperative`](Self::await_cooperative) so sibling units keep
    /// making progress.
    pub fn await_task<T: 'static>(&self, task: impl Into<TaskInput<T>>) -> Result<T> {
        let mut unit = task.into().into_unit();
        if in_unit() {
            debug!(unit = %unit.id(), "blocking await inside a unit");
        }
        trace!(unit = %unit.id(), "awaiting unit");
        self.drive(&mut unit)
    }

    /// Drives a task like [`await_task`](Self::await_task), delivering the
    /// outcome as a settled [`Promise`]. Blocks the thread.
    pub fn await_promise<T: 'static>(&self, task: impl Into<TaskInput<T>>) -> Promise<T> {
        Promise::from(self.await_task(task))
    }

    /// Drives a task to termination from inside the calling unit,
    /// suspending it between attempts.
    ///
    /// Fails with [`ErrorKind::NoCurrentUnit`](crate::ErrorKind::NoCurrentUnit)
    /// when called outside a unit and the task needs more than one attempt.
    pub async fn await_cooperative<T: 'static>(
        &self,
        task: impl Into<TaskInput<T>>,
    ) -> Result<T> {
        let mut unit = task.into().into_unit();
        trace!(unit = %unit.id(), "awaiting unit cooperatively");
        self.drive_cooperative(&mut unit).await
    }

    /// Like [`await_cooperative`](Self::await_cooperative), delivering the
    /// outcome as a settled [`Promise`].
    pub async fn await_promise_cooperative<T: 'static>(
        &self,
        task: impl Into<TaskInput<T>>,
    ) -> Promise<T> {
        Promise::from(self.await_cooperative(task).await)
    }

    /// Suspends the current unit until `duration` has passed on this
    /// driver's clock.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        sleep_on(self.clock.as_ref(), duration).await
    }

    /// Builds a unit that, once started, waits `delay` on this driver's clock
    /// and then runs `callback`.
    ///
    /// Nothing happens until the caller starts and resumes the unit; a unit
    /// that is never driven never fires.
    pub fn timeout_unit<T, F, E>(&self, callback: F, delay: Duration) -> Unit<T>
    where
        T: 'static,
        F: FnOnce() -> std::result::Result<T, E> + 'static,
        E: Into<BoxError> + 'static,
    {
        let clock = Arc::clone(&self.clock);
        Unit::new(move || async move {
            sleep_on(clock.as_ref(), delay)
                .await
                .map_err(BoxError::from)?;
            callback().map_err(Into::<BoxError>::into)
        })
    }

    /// Runs `callback` after `delay`, blocking until it has fired.
    pub fn set_timeout<T, F, E>(&self, callback: F, delay: Duration) -> Result<T>
    where
        T: 'static,
        F: FnOnce() -> std::result::Result<T, E> + 'static,
        E: Into<BoxError> + 'static,
    {
        let mut unit = self.timeout_unit(callback, delay);
        self.drive(&mut unit)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("poll_delay", &self.poll_delay)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Wraps a computation in a unit without starting it.
pub fn defer<T, F, Fut, E>(computation: F) -> Unit<T>
where
    T: 'static,
    F: FnOnce() -> Fut + 'static,
    Fut: std::future::Future<Output = std::result::Result<T, E>> + 'static,
    E: Into<BoxError> + 'static,
{
    Unit::new(computation)
}

/// Drives a task to termination on the wall clock, blocking the thread.
///
/// `timeout` of `None` waits forever; `poll_delay` is the pause between
/// attempts. From inside a scheduled task use [`await_cooperative`], or
/// siblings stall until this returns.
pub fn await_task<T: 'static>(
    task: impl Into<TaskInput<T>>,
    timeout: Option<Duration>,
    poll_delay: Duration,
) -> Result<T> {
    Driver::new()
        .timeout(timeout)
        .poll_delay(poll_delay)
        .await_task(task)
}

/// Like [`await_task`], delivering the outcome as a [`Promise`].
pub fn await_promise<T: 'static>(
    task: impl Into<TaskInput<T>>,
    poll_delay: Duration,
    max_wait: Option<Duration>,
) -> Promise<T> {
    Driver::new()
        .timeout(max_wait)
        .poll_delay(poll_delay)
        .await_promise(task)
}

/// Drives a task to termination on the wall clock from inside the calling
/// unit, suspending it between attempts so siblings keep running.
///
/// `timeout` of `None` waits forever.
pub async fn await_cooperative<T: 'static>(
    task: impl Into<TaskInput<T>>,
    timeout: Option<Duration>,
) -> Result<T> {
    Driver::new().timeout(timeout).await_cooperative(task).await
}

/// Like [`await_cooperative`], delivering the outcome as a [`Promise`].
pub async fn await_promise_cooperative<T: 'static>(
    task: impl Into<TaskInput<T>>,
    max_wait: Option<Duration>,
) -> Promise<T> {
    Driver::new()
        .timeout(max_wait)
        .await_promise_cooperative(task)
        .await
}
