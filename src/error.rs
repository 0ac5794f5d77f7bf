//! Error types for the cooperative runtime.
//!
//! Every fallible operation in the crate returns [`Error`], a small struct
//! pairing an [`ErrorKind`] with optional context and an optional boxed
//! cause. Failures raised by task or stage bodies are never flattened into
//! strings: the original error stays reachable through
//! [`std::error::Error::source`].

use core::fmt;
use std::any::Any;
use std::time::Duration;

use crate::types::TaskId;

/// Boxed error accepted from task and stage bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Whether a failing pipeline stage ran inline or as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// The stage was called directly with the current value.
    Sync,
    /// The stage was driven as a suspendable unit.
    Async,
}

impl StageKind {
    /// Returns the kind name in lowercase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Async => "async",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The host cannot suspend and resume computations.
    CapabilityUnavailable,
    /// `run`/`until` was called while the same scheduler was driving.
    AlreadyRunning,
    /// A single-unit await ran past its timeout.
    DeadlineExceeded,
    /// A task body returned an error or panicked.
    TaskFailed,
    /// A pipeline stage returned an error or panicked.
    StageFailed(StageKind),
    /// A unit was started twice, or resumed while not suspended.
    InvalidTransition,
    /// A suspension point was reached outside any running unit.
    NoCurrentUnit,
}

impl ErrorKind {
    /// Returns a short, stable description of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CapabilityUnavailable => "cooperative suspension unavailable",
            Self::AlreadyRunning => "scheduler already running",
            Self::DeadlineExceeded => "deadline exceeded",
            Self::TaskFailed => "task execution failed",
            Self::StageFailed(StageKind::Sync) => "sync stage failed",
            Self::StageFailed(StageKind::Async) => "async stage failed",
            Self::InvalidTransition => "invalid unit transition",
            Self::NoCurrentUnit => "no current unit",
        }
    }
}

/// An error produced by units, the scheduler or a pipeline.
///
/// # Example
///
/// ```
/// use fibersync::{Error, ErrorKind};
///
/// let err = Error::new(ErrorKind::AlreadyRunning).with_context("until");
/// assert!(err.is_already_running());
/// assert_eq!(err.context(), Some("until"));
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
    task: Option<TaskId>,
    source: Option<BoxError>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            task: None,
            source: None,
        }
    }

    /// Creates a capability error with a reason.
    #[must_use]
    pub fn capability_unavailable(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::CapabilityUnavailable).with_context(reason)
    }

    /// Creates an already-running error.
    #[must_use]
    pub const fn already_running() -> Self {
        Self::new(ErrorKind::AlreadyRunning)
    }

    /// Creates a deadline error for a timeout that elapsed after `elapsed`.
    #[must_use]
    pub fn deadline_exceeded(timeout: Duration, elapsed: Duration) -> Self {
        Self::new(ErrorKind::DeadlineExceeded)
            .with_context(format!("timeout {timeout:?}, elapsed {elapsed:?}"))
    }

    /// Wraps a failure raised by a task body.
    #[must_use]
    pub fn task_failed(cause: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::TaskFailed).with_source(cause)
    }

    /// Converts a caught panic payload into a task failure.
    #[must_use]
    pub fn panicked(payload: Box<dyn Any + Send>) -> Self {
        Self::task_failed(PanicError::from_payload(payload.as_ref()))
    }

    /// Creates an invalid-transition error describing the attempted action.
    #[must_use]
    pub fn invalid_transition(action: &str, state: impl fmt::Display) -> Self {
        Self::new(ErrorKind::InvalidTransition)
            .with_context(format!("cannot {action} a {state} unit"))
    }

    /// Creates an error for a suspension attempted outside any unit.
    #[must_use]
    pub const fn no_current_unit() -> Self {
        Self::new(ErrorKind::NoCurrentUnit)
    }

    /// Normalizes a failure into a pipeline stage error.
    ///
    /// A task failure (the usual shape coming out of a unit) is unwrapped so
    /// the stage error points straight at the body's own cause.
    #[must_use]
    pub fn stage_failed(kind: StageKind, index: usize, cause: Self) -> Self {
        let source: BoxError = match cause {
            Self {
                kind: ErrorKind::TaskFailed,
                source: Some(source),
                ..
            } => source,
            other => Box::new(other),
        };
        Self::new(ErrorKind::StageFailed(kind))
            .with_context(format!("stage {index}"))
            .with_source(source)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Adds context to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Records the id of the task that failed.
    #[must_use]
    pub fn with_task(mut self, task: TaskId) -> Self {
        self.task = Some(task);
        self
    }

    /// Returns the error context, if any.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns the id of the failed task, if one was recorded.
    #[must_use]
    pub fn task(&self) -> Option<&TaskId> {
        self.task.as_ref()
    }

    /// Returns the pipeline stage kind for stage failures.
    #[must_use]
    pub const fn stage_kind(&self) -> Option<StageKind> {
        match self.kind {
            ErrorKind::StageFailed(kind) => Some(kind),
            _ => None,
        }
    }

    /// Returns the wrapped cause downcast to a concrete type.
    #[must_use]
    pub fn cause<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.as_deref().and_then(|e| e.downcast_ref::<E>())
    }

    /// Returns `true` if the host lacks cooperative suspension.
    #[must_use]
    pub const fn is_capability_unavailable(&self) -> bool {
        matches!(self.kind, ErrorKind::CapabilityUnavailable)
    }

    /// Returns `true` for re-entrant drive attempts.
    #[must_use]
    pub const fn is_already_running(&self) -> bool {
        matches!(self.kind, ErrorKind::AlreadyRunning)
    }

    /// Returns `true` if an await timed out.
    #[must_use]
    pub const fn is_deadline_exceeded(&self) -> bool {
        matches!(self.kind, ErrorKind::DeadlineExceeded)
    }

    /// Returns `true` if a task body failed.
    #[must_use]
    pub const fn is_task_failure(&self) -> bool {
        matches!(self.kind, ErrorKind::TaskFailed)
    }

    /// Returns `true` if a pipeline stage failed.
    #[must_use]
    pub const fn is_stage_failure(&self) -> bool {
        matches!(self.kind, ErrorKind::StageFailed(_))
    }

    /// Returns `true` for illegal unit lifecycle transitions.
    #[must_use]
    pub const fn is_invalid_transition(&self) -> bool {
        matches!(self.kind, ErrorKind::InvalidTransition)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;

        if let Some(task) = &self.task {
            write!(f, " [{task}]")?;
        }
        if let Some(ctx) = &self.context {
            write!(f, ": {ctx}")?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// A panic caught while polling a unit body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("panicked: {message}")]
pub struct PanicError {
    message: String,
}

impl PanicError {
    /// Creates a panic error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Extracts a message from a `catch_unwind` payload.
    #[must_use]
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self { message }
    }

    /// Returns the panic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
