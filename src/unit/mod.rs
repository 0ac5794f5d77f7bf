//! Suspendable units: the coroutine primitive the runtime is built on.
//!
//! A [`Unit`] owns one deferred computation expressed as a future. Nothing
//! runs until [`start`](Unit::start); from then on the unit executes until
//! it either finishes or reaches a suspension point ([`suspend`],
//! [`suspend_with`], [`yield_now`](crate::runtime::yield_now) or any other
//! future returning `Pending`). Control only ever changes hands at those
//! points; the driver decides when to [`resume`](Unit::resume).
//!
//! # Example
//!
//! ```
//! use fibersync::unit::{self, Step, Unit};
//! use fibersync::BoxError;
//!
//! let mut unit = Unit::new(|| async {
//!     let reply = unit::suspend_with("ping").await?;
//!     let reply = reply.and_then(|p| p.downcast::<u32>().ok()).unwrap_or(0);
//!     Ok::<_, BoxError>(reply + 1)
//! });
//!
//! let Step::Suspended(Some(yielded)) = unit.start()? else { unreachable!() };
//! assert_eq!(yielded.downcast_ref::<&str>(), Some(&"ping"));
//!
//! assert!(unit.resume_with(41_u32)?.is_terminated());
//! assert_eq!(unit.take_return()?, 42);
//! # Ok::<(), fibersync::Error>(())
//! ```

mod capability;
mod suspend;

pub use capability::Capability;
pub use suspend::{CurrentUnit, Payload, Suspend, current, in_unit, suspend, suspend_with};

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use futures_lite::FutureExt;
use futures_lite::future::BoxedLocal;

use crate::error::{BoxError, Error, Result};
use crate::tracing_compat::trace;
use crate::types::UnitId;
use suspend::{Enter, Handoff};

/// Lifecycle state of a [`Unit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    /// Built but never started.
    Created,
    /// Currently being polled.
    Running,
    /// Parked at a suspension point, waiting for `resume`.
    Suspended,
    /// Finished, with a return value or a failure.
    Terminated,
}

impl UnitState {
    /// Returns the state name in lowercase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Suspended => "suspended",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened during one `start`/`resume` call.
#[derive(Debug)]
pub enum Step {
    /// The unit reached a suspension point, optionally yielding a value.
    Suspended(Option<Payload>),
    /// The unit finished and its return value is available.
    Terminated,
}

impl Step {
    /// Returns `true` if the unit finished during this step.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

pub(crate) type Thunk<T> = Box<dyn FnOnce() -> BoxedLocal<std::result::Result<T, BoxError>>>;

/// Boxes an async computation without calling it.
pub(crate) fn thunk<T, F, Fut, E>(computation: F) -> Thunk<T>
where
    T: 'static,
    F: FnOnce() -> Fut + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + 'static,
    E: Into<BoxError> + 'static,
{
    Box::new(move || {
        let future = async move { computation().await.map_err(Into::<BoxError>::into) };
        future.boxed_local()
    })
}

enum Body<T> {
    Deferred(Thunk<T>),
    Running(BoxedLocal<std::result::Result<T, BoxError>>),
    Finished,
}

/// A resumable, one-shot computation producing a `T`.
///
/// Units are single-threaded: they are neither `Send` nor `Sync`, and
/// exactly one driver owns a unit's resumption at a time.
pub struct Unit<T> {
    id: UnitId,
    state: UnitState,
    body: Body<T>,
    output: Option<T>,
    failed: bool,
    handoff: Rc<Handoff>,
}

impl<T: 'static> Unit<T> {
    /// Wraps an async computation. The closure is not called until `start`.
    pub fn new<F, Fut, E>(computation: F) -> Self
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + 'static,
        E: Into<BoxError> + 'static,
    {
        Self::from_thunk(thunk(computation))
    }

    /// Wraps a synchronous computation that never suspends.
    pub fn from_fn<F, E>(computation: F) -> Self
    where
        F: FnOnce() -> std::result::Result<T, E> + 'static,
        E: Into<BoxError> + 'static,
    {
        Self::new(move || async move { computation() })
    }

    /// Wraps a future that is already built.
    pub fn from_future<Fut, E>(future: Fut) -> Self
    where
        Fut: Future<Output = std::result::Result<T, E>> + 'static,
        E: Into<BoxError> + 'static,
    {
        Self::new(move || future)
    }

    pub(crate) fn from_thunk(thunk: Thunk<T>) -> Self {
        let id = UnitId::next();
        Self {
            id,
            state: UnitState::Created,
            body: Body::Deferred(thunk),
            output: None,
            failed: false,
            handoff: Handoff::new(id),
        }
    }
}

impl<T> Unit<T> {
    /// Returns this unit's id.
    #[must_use]
    pub const fn id(&self) -> UnitId {
        self.id
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> UnitState {
        self.state
    }

    /// Returns `true` once `start` has been called.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state != UnitState::Created
    }

    /// Returns `true` while parked at a suspension point.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.state == UnitState::Suspended
    }

    /// Returns `true` once the computation has finished.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state == UnitState::Terminated
    }

    /// Returns `true` if the computation finished with an error or panic.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.failed
    }

    /// Begins execution.
    ///
    /// Runs until the first suspension point or until the computation
    /// finishes. Failures of the body are returned as
    /// [`ErrorKind::TaskFailed`](crate::ErrorKind::TaskFailed); starting a
    /// unit twice is an invalid transition.
    pub fn start(&mut self) -> Result<Step> {
        let thunk = match std::mem::replace(&mut self.body, Body::Finished) {
            Body::Deferred(thunk) => thunk,
            other => {
                self.body = other;
                return Err(Error::invalid_transition("start", self.state));
            }
        };
        trace!(unit = %self.id, "unit starting");
        let future = thunk();
        self.body = Body::Running(future);
        self.step()
    }

    /// Continues a suspended unit without injecting a value.
    pub fn resume(&mut self) -> Result<Step> {
        self.resume_inner(None)
    }

    /// Continues a suspended unit, delivering `value` as the result of its
    /// pending suspension point.
    pub fn resume_with<V: std::any::Any>(&mut self, value: V) -> Result<Step> {
        self.resume_inner(Some(Payload::new(value)))
    }

    /// Continues a suspended unit with an optional pre-built payload.
    pub fn resume_payload(&mut self, value: Option<Payload>) -> Result<Step> {
        self.resume_inner(value)
    }

    fn resume_inner(&mut self, value: Option<Payload>) -> Result<Step> {
        if self.state != UnitState::Suspended {
            return Err(Error::invalid_transition("resume", self.state));
        }
        self.handoff.inject(value);
        self.step()
    }

    fn step(&mut self) -> Result<Step> {
        let Body::Running(future) = &mut self.body else {
            return Err(Error::invalid_transition("poll", self.state));
        };
        self.state = UnitState::Running;
        let polled = {
            let _enter = Enter::new(&self.handoff);
            let mut cx = Context::from_waker(Waker::noop());
            panic::catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx)))
        };
        match polled {
            Ok(Poll::Pending) => {
                self.state = UnitState::Suspended;
                Ok(Step::Suspended(self.handoff.take_yielded()))
            }
            Ok(Poll::Ready(Ok(value))) => {
                self.finish();
                self.output = Some(value);
                trace!(unit = %self.id, "unit terminated");
                Ok(Step::Terminated)
            }
            Ok(Poll::Ready(Err(cause))) => Err(self.fail(Error::task_failed(cause))),
            Err(payload) => Err(self.fail(Error::panicked(payload))),
        }
    }

    fn finish(&mut self) {
        self.body = Body::Finished;
        self.state = UnitState::Terminated;
        self.handoff.take_yielded();
    }

    fn fail(&mut self, err: Error) -> Error {
        self.finish();
        self.failed = true;
        trace!(unit = %self.id, error = %err, "unit failed");
        err
    }

    /// Borrows the return value of a terminated unit.
    pub fn get_return(&self) -> Result<&T> {
        self.output
            .as_ref()
            .ok_or_else(|| self.no_return("read the return of"))
    }

    /// Takes the return value of a terminated unit.
    ///
    /// The value can be taken once; later calls fail like reading a
    /// unit that has not finished.
    pub fn take_return(&mut self) -> Result<T> {
        match self.output.take() {
            Some(value) => Ok(value),
            None => Err(self.no_return("take the return of")),
        }
    }

    fn no_return(&self, action: &str) -> Error {
        if self.failed {
            Error::invalid_transition(action, "failed")
        } else {
            Error::invalid_transition(action, self.state)
        }
    }
}

impl<T> fmt::Debug for Unit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::cell::Cell;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl std::error::Error for Boom {}

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn created_unit_does_not_run() {
        init_test("created_unit_does_not_run");
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let unit = Unit::from_fn(move || {
            flag.set(true);
            Ok::<_, BoxError>(1)
        });
        crate::assert_with_log!(!ran.get(), "body untouched", false, ran.get());
        crate::assert_with_log!(
            unit.state() == UnitState::Created,
            "state",
            UnitState::Created,
            unit.state()
        );
        assert!(!unit.is_started());
        crate::test_complete!("created_unit_does_not_run");
    }

    #[test]
    fn start_runs_to_completion_without_suspension() {
        init_test("start_runs_to_completion_without_suspension");
        let mut unit = Unit::from_fn(|| Ok::<_, BoxError>("done"));
        let step = unit.start().expect("start");
        assert!(step.is_terminated());
        assert!(unit.is_terminated());
        assert_eq!(unit.get_return().ok(), Some(&"done"));
        assert_eq!(unit.take_return().ok(), Some("done"));
        crate::test_complete!("start_runs_to_completion_without_suspension");
    }

    #[test]
    fn values_flow_both_ways() {
        init_test("values_flow_both_ways");
        let mut unit = Unit::new(|| async {
            let first = suspend_with(1_i32).await?;
            let first = first.and_then(|p| p.downcast::<i32>().ok()).unwrap_or(0);
            let second = suspend_with(first * 2).await?;
            let second = second.and_then(|p| p.downcast::<i32>().ok()).unwrap_or(0);
            Ok::<_, Error>(first + second)
        });

        let Step::Suspended(Some(y)) = unit.start().expect("start") else {
            panic!("expected first yield");
        };
        assert_eq!(y.downcast::<i32>().ok(), Some(1));
        assert!(unit.is_suspended());

        let Step::Suspended(Some(y)) = unit.resume_with(10_i32).expect("resume") else {
            panic!("expected second yield");
        };
        assert_eq!(y.downcast::<i32>().ok(), Some(20));

        assert!(unit.resume_with(5_i32).expect("resume").is_terminated());
        assert_eq!(unit.take_return().ok(), Some(15));
        crate::test_complete!("values_flow_both_ways");
    }

    #[test]
    fn resume_without_value_injects_none() {
        init_test("resume_without_value_injects_none");
        let mut unit = Unit::new(|| async {
            let injected = suspend().await?;
            Ok::<_, Error>(injected.is_none())
        });
        assert!(matches!(unit.start(), Ok(Step::Suspended(None))));
        assert!(unit.resume().expect("resume").is_terminated());
        assert_eq!(unit.take_return().ok(), Some(true));
        crate::test_complete!("resume_without_value_injects_none");
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        init_test("illegal_transitions_are_rejected");
        let mut unit = Unit::new(|| async {
            suspend().await?;
            Ok::<_, Error>(())
        });

        let err = unit.resume().expect_err("resume before start");
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        unit.start().expect("start");
        let err = unit.start().expect_err("double start");
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert!(unit.get_return().is_err());

        unit.resume().expect("resume");
        let err = unit.resume().expect_err("resume after termination");
        assert!(err.is_invalid_transition());
        assert!(unit.is_terminated());
        crate::test_complete!("illegal_transitions_are_rejected");
    }

    #[test]
    fn body_error_surfaces_from_driving_call() {
        init_test("body_error_surfaces_from_driving_call");
        let mut unit = Unit::new(|| async {
            suspend().await?;
            Err::<(), BoxError>(Boom.into())
        });
        unit.start().expect("start");
        let err = unit.resume().expect_err("body fails");
        assert!(err.is_task_failure());
        assert!(err.cause::<Boom>().is_some());
        assert!(unit.is_terminated());
        assert!(unit.is_failed());
        let err = unit.take_return().expect_err("no return after failure");
        assert!(err.context().is_some_and(|c| c.contains("failed")));
        crate::test_complete!("body_error_surfaces_from_driving_call");
    }

    #[test]
    fn panics_are_caught_as_failures() {
        init_test("panics_are_caught_as_failures");
        let mut unit: Unit<()> = Unit::from_fn(|| -> std::result::Result<(), BoxError> {
            panic!("kaboom");
        });
        let err = unit.start().expect_err("panic becomes error");
        let panic = err.cause::<crate::error::PanicError>().expect("panic cause");
        assert_eq!(panic.message(), "kaboom");
        assert!(unit.is_terminated());
        crate::test_complete!("panics_are_caught_as_failures");
    }

    #[test]
    fn current_reports_the_running_unit() {
        init_test("current_reports_the_running_unit");
        let seen = Rc::new(Cell::new(None));
        let sink = Rc::clone(&seen);
        let mut unit = Unit::from_fn(move || {
            sink.set(current().map(|u| u.id()));
            Ok::<_, BoxError>(())
        });
        let id = unit.id();
        unit.start().expect("start");
        assert_eq!(seen.get(), Some(id));
        assert!(current().is_none());
        crate::test_complete!("current_reports_the_running_unit");
    }

    #[test]
    fn nested_units_see_innermost() {
        init_test("nested_units_see_innermost");
        let mut outer = Unit::new(|| async {
            let outer_id = current().map(|u| u.id());
            let mut inner = Unit::from_fn(|| Ok::<_, BoxError>(current().map(|u| u.id())));
            let inner_id = inner.id();
            inner.start()?;
            let seen_inner = inner.take_return()?;
            let after = current().map(|u| u.id());
            Ok::<_, Error>((outer_id, seen_inner == Some(inner_id), after == outer_id))
        });
        let outer_id = outer.id();
        outer.start().expect("start");
        let (seen_outer, inner_ok, restored) = outer.take_return().expect("return");
        assert_eq!(seen_outer, Some(outer_id));
        assert!(inner_ok);
        assert!(restored);
        crate::test_complete!("nested_units_see_innermost");
    }
}
