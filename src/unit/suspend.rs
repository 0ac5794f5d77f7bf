//! Suspension points and the current-unit registry.
//!
//! While a [`Unit`](super::Unit) is being polled, its handoff slot sits on a
//! thread-local stack. [`suspend`] and [`suspend_with`] find the innermost
//! slot there, park their payload in it and return `Pending`; the driver
//! picks the payload up as the unit's yielded value. On the next poll
//! (which only happens through `resume`) the future completes with whatever
//! the driver injected.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::error::{Error, Result};
use crate::types::UnitId;

thread_local! {
    static ACTIVE: RefCell<Vec<Rc<Handoff>>> = const { RefCell::new(Vec::new()) };
}

/// A type-erased value passed across a suspension point.
///
/// Units yield payloads to their driver and drivers inject payloads back on
/// resume. Both directions use the same type; the receiving side downcasts.
pub struct Payload(Box<dyn Any>);

impl Payload {
    /// Wraps a value.
    #[must_use]
    pub fn new<T: Any>(value: T) -> Self {
        Self(Box::new(value))
    }

    /// Returns `true` if the payload holds a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    /// Borrows the payload as a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Takes the payload as a `T`, handing it back unchanged on mismatch.
    pub fn downcast<T: Any>(self) -> std::result::Result<T, Self> {
        self.0.downcast::<T>().map(|b| *b).map_err(Self)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload").finish_non_exhaustive()
    }
}

/// The slot shared between a unit and the body it is polling.
#[derive(Debug)]
pub(crate) struct Handoff {
    id: UnitId,
    yielded: RefCell<Option<Payload>>,
    injected: RefCell<Option<Payload>>,
}

impl Handoff {
    pub(crate) fn new(id: UnitId) -> Rc<Self> {
        Rc::new(Self {
            id,
            yielded: RefCell::new(None),
            injected: RefCell::new(None),
        })
    }

    pub(crate) fn take_yielded(&self) -> Option<Payload> {
        self.yielded.borrow_mut().take()
    }

    pub(crate) fn inject(&self, value: Option<Payload>) {
        *self.injected.borrow_mut() = value;
    }
}

/// Marks a handoff slot as active for the duration of one poll.
pub(crate) struct Enter {
    id: UnitId,
}

impl Enter {
    pub(crate) fn new(handoff: &Rc<Handoff>) -> Self {
        ACTIVE.with(|stack| stack.borrow_mut().push(Rc::clone(handoff)));
        Self { id: handoff.id }
    }
}

impl Drop for Enter {
    fn drop(&mut self) {
        ACTIVE.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(stack.last().map(|h| h.id), Some(self.id));
            stack.pop();
        });
    }
}

fn innermost() -> Option<Rc<Handoff>> {
    ACTIVE.with(|stack| stack.borrow().last().cloned())
}

/// Handle to the unit executing on this thread.
#[derive(Debug, Clone)]
pub struct CurrentUnit {
    handoff: Rc<Handoff>,
}

impl CurrentUnit {
    /// Returns the id of the running unit.
    #[must_use]
    pub fn id(&self) -> UnitId {
        self.handoff.id
    }
}

/// Returns the unit currently being polled on this thread, if any.
///
/// Nested units report the innermost one.
#[must_use]
pub fn current() -> Option<CurrentUnit> {
    innermost().map(|handoff| CurrentUnit { handoff })
}

/// Returns `true` when called from inside a running unit.
#[must_use]
pub fn in_unit() -> bool {
    ACTIVE.with(|stack| !stack.borrow().is_empty())
}

enum SuspendState {
    Init(Option<Payload>),
    Waiting(Rc<Handoff>),
    Done,
}

/// Future returned by [`suspend`] and [`suspend_with`].
///
/// Resolves to the payload injected by the driver's `resume`, or `None` when
/// the unit was resumed without a value. Polling it outside a running unit
/// fails with [`ErrorKind::NoCurrentUnit`](crate::ErrorKind::NoCurrentUnit).
#[must_use = "suspension happens only when the future is awaited"]
pub struct Suspend {
    state: SuspendState,
}

impl Future for Suspend {
    type Output = Result<Option<Payload>>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        match std::mem::replace(&mut self.state, SuspendState::Done) {
            SuspendState::Init(value) => {
                let Some(handoff) = innermost() else {
                    return Poll::Ready(Err(Error::no_current_unit()));
                };
                *handoff.yielded.borrow_mut() = value;
                self.state = SuspendState::Waiting(handoff);
                Poll::Pending
            }
            SuspendState::Waiting(handoff) => Poll::Ready(Ok(handoff.injected.borrow_mut().take())),
            SuspendState::Done => Poll::Ready(Ok(None)),
        }
    }
}

impl fmt::Debug for Suspend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            SuspendState::Init(_) => "init",
            SuspendState::Waiting(_) => "waiting",
            SuspendState::Done => "done",
        };
        f.debug_struct("Suspend").field("state", &state).finish()
    }
}

/// Suspends the running unit without yielding a value.
pub fn suspend() -> Suspend {
    Suspend {
        state: SuspendState::Init(None),
    }
}

/// Suspends the running unit, handing `value` to its driver.
pub fn suspend_with<T: Any>(value: T) -> Suspend {
    Suspend {
        state: SuspendState::Init(Some(Payload::new(value))),
    }
}
