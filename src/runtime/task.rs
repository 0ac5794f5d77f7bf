//! Task inputs and references accepted by the scheduler.

use std::fmt;
use std::future::Future;

use crate::error::BoxError;
use crate::types::TaskId;
use crate::unit::{self, Thunk, Unit};

enum Input<T> {
    Callable(Thunk<T>),
    Prebuilt(Unit<T>),
}

/// Something the scheduler can own as a task: a callable not yet wrapped,
/// or a unit built by the caller.
///
/// Callables needing arguments capture them in the closure. Either shape
/// resolves to a [`Unit`] once, when the task is inserted.
pub struct TaskInput<T>(Input<T>);

impl<T: 'static> TaskInput<T> {
    /// Wraps an async callable.
    pub fn new<F, Fut, E>(computation: F) -> Self
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
        E: Into<BoxError> + 'static,
    {
        Self(Input::Callable(unit::thunk(computation)))
    }

    /// Wraps a synchronous callable.
    pub fn from_fn<F, E>(computation: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + 'static,
        E: Into<BoxError> + 'static,
    {
        Self::new(move || async move { computation() })
    }

    /// Resolves the input into the unit the scheduler will drive.
    #[must_use]
    pub fn into_unit(self) -> Unit<T> {
        match self.0 {
            Input::Callable(thunk) => Unit::from_thunk(thunk),
            Input::Prebuilt(unit) => unit,
        }
    }
}

impl<T> TaskInput<T> {
    /// Returns `true` if the input is a caller-built unit.
    #[must_use]
    pub const fn is_prebuilt(&self) -> bool {
        matches!(self.0, Input::Prebuilt(_))
    }
}

impl<T> From<Unit<T>> for TaskInput<T> {
    fn from(unit: Unit<T>) -> Self {
        Self(Input::Prebuilt(unit))
    }
}

impl<T> fmt::Debug for TaskInput<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Input::Callable(_) => f.write_str("TaskInput::Callable"),
            Input::Prebuilt(unit) => f.debug_tuple("TaskInput::Prebuilt").field(unit).finish(),
        }
    }
}

/// Addresses a queued task by id or by list position.
///
/// A position `n` is shorthand for the synthetic id `task_{n}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskRef {
    /// An explicit id.
    Id(TaskId),
    /// A list position, resolved to `task_{n}`.
    Index(usize),
}

impl TaskRef {
    /// Resolves the reference to an id.
    #[must_use]
    pub fn to_id(&self) -> TaskId {
        match self {
            Self::Id(id) => id.clone(),
            Self::Index(index) => TaskId::positional(*index),
        }
    }
}

impl From<usize> for TaskRef {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<TaskId> for TaskRef {
    fn from(id: TaskId) -> Self {
        Self::Id(id)
    }
}

impl From<&TaskId> for TaskRef {
    fn from(id: &TaskId) -> Self {
        Self::Id(id.clone())
    }
}

impl From<&str> for TaskRef {
    fn from(id: &str) -> Self {
        Self::Id(TaskId::from(id))
    }
}

impl From<String> for TaskRef {
    fn from(id: String) -> Self {
        Self::Id(TaskId::from(id))
    }
}
