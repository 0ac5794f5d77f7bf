//! Voluntary yield point.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::unit::in_unit;

/// Future that hands control back to whoever drives the current unit.
///
/// Inside a unit the first poll parks it as `Suspended` with no yielded
/// value; the next `resume` completes the future. Outside a unit it behaves
/// like a plain executor yield: it wakes itself and returns `Pending` once.
#[derive(Debug)]
#[must_use = "yielding happens only when the future is awaited"]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        if !in_unit() {
            cx.waker().wake_by_ref();
        }
        Poll::Pending
    }
}

/// Yields once, letting the scheduler run other units.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}
