//! Promise-style delivery of an awaited task's outcome.
//!
//! [`Driver::await_promise`](super::Driver::await_promise) drives a task
//! exactly like [`Driver::await_task`](super::Driver::await_task) but hands
//! back a settled [`Promise`] instead of returning or failing directly. The
//! combinators consume the promise and return a new one, so call sites
//! read as a chain:
//!
//! ```
//! use fibersync::runtime::{Driver, TaskInput};
//! use fibersync::BoxError;
//!
//! let driver = Driver::new();
//! let mut settled = false;
//! let doubled = driver
//!     .await_promise(TaskInput::from_fn(|| Ok::<_, BoxError>(21)))
//!     .then(|v| v * 2)
//!     .catch(|_err| 0)
//!     .finally(|| settled = true)
//!     .into_result()?;
//! assert_eq!(doubled, 42);
//! assert!(settled);
//! # Ok::<(), fibersync::Error>(())
//! ```

use std::future::{IntoFuture, Ready, ready};

use crate::error::{Error, Result};

/// A settled outcome with promise-style chaining.
#[derive(Debug)]
#[must_use = "a rejected promise carries an error that should be handled"]
pub struct Promise<T> {
    outcome: Result<T>,
}

impl<T> Promise<T> {
    /// Creates a fulfilled promise.
    pub const fn resolved(value: T) -> Self {
        Self { outcome: Ok(value) }
    }

    /// Creates a rejected promise.
    pub const fn rejected(err: Error) -> Self {
        Self { outcome: Err(err) }
    }

    /// Returns `true` if the promise holds a value.
    #[must_use]
    pub const fn is_fulfilled(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Returns `true` if the promise holds an error.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        self.outcome.is_err()
    }

    /// Maps the value of a fulfilled promise. Rejections pass through.
    pub fn then<U, F>(self, on_success: F) -> Promise<U>
    where
        F: FnOnce(T) -> U,
    {
        Promise {
            outcome: self.outcome.map(on_success),
        }
    }

    /// Chains a fallible step on a fulfilled promise.
    pub fn and_then<U, F>(self, on_success: F) -> Promise<U>
    where
        F: FnOnce(T) -> Result<U>,
    {
        Promise {
            outcome: self.outcome.and_then(on_success),
        }
    }

    /// Recovers a rejected promise with a replacement value.
    pub fn catch<F>(self, on_error: F) -> Self
    where
        F: FnOnce(Error) -> T,
    {
        Self {
            outcome: Ok(self.outcome.unwrap_or_else(on_error)),
        }
    }

    /// Runs `on_settled` regardless of the outcome.
    pub fn finally<F>(self, on_settled: F) -> Self
    where
        F: FnOnce(),
    {
        on_settled();
        self
    }

    /// Returns the value or the error.
    pub fn into_result(self) -> Result<T> {
        self.outcome
    }
}

impl<T> From<Result<T>> for Promise<T> {
    fn from(outcome: Result<T>) -> Self {
        Self { outcome }
    }
}

impl<T> IntoFuture for Promise<T> {
    type Output = Result<T>;
    type IntoFuture = Ready<Result<T>>;

    fn into_future(self) -> Self::IntoFuture {
        ready(self.outcome)
    }
}
