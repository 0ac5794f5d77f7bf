//! Value pipelines.
//!
//! A [`Pipeline`] threads one value through stages applied in registration
//! order. A failing stage is reported to the single handler registered with
//! [`catch`](Pipeline::catch), whose [`Recovery`] decides what happens next:
//!
//! ```
//! use fibersync::pipeline::{Pipeline, Recovery};
//! use fibersync::BoxError;
//!
//! let value = Pipeline::new(5)
//!     .catch(|_err, _before| Recovery::LastState)
//!     .pipe(|v| Ok::<_, BoxError>(v + 1))?
//!     .pipe(|_| Err::<i32, _>(BoxError::from("broken stage")))?
//!     .pipe(|v| Ok::<_, BoxError>(v * 100))?
//!     .into_result();
//! assert_eq!(value, Some(6));
//! # Ok::<(), fibersync::Error>(())
//! ```
//!
//! Without a handler, the first failure is returned from `pipe` and the
//! pipeline is consumed.
//!
//! In async mode every callable stage runs inside its own [`Unit`] and may
//! suspend; `pipe` and `pipe_async` drive that unit to termination before
//! moving on, blocking the thread. A pipeline used from inside a scheduled
//! task should apply suspending stages with
//! [`pipe_cooperative`](Pipeline::pipe_cooperative), which suspends the task
//! between attempts instead.
//!
//! [`Unit`]: crate::unit::Unit

mod stage;

pub use stage::Recovery;

use std::fmt;
use std::future::Future;

use crate::config::SchedulerConfig;
use crate::error::{BoxError, Error, Result, StageKind};
use crate::tracing_compat::debug;
use stage::Handler;

/// A value threaded through ordered stages with one error handler.
pub struct Pipeline<T> {
    value: Option<T>,
    stopped: bool,
    async_mode: bool,
    stages_run: usize,
    handler: Option<Handler<T>>,
    config: SchedulerConfig,
}

impl<T: Clone + 'static> Pipeline<T> {
    /// Creates a synchronous pipeline holding `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            value: Some(value),
            stopped: false,
            async_mode: false,
            stages_run: 0,
            handler: None,
            config: SchedulerConfig::default(),
        }
    }

    /// Alias of [`new`](Self::new) that reads well at the head of a chain.
    #[must_use]
    pub fn chain(value: T) -> Self {
        Self::new(value)
    }

    /// Creates an async-mode pipeline with the default configuration.
    ///
    /// Fails with [`ErrorKind::CapabilityUnavailable`](crate::ErrorKind::CapabilityUnavailable)
    /// when units cannot suspend on this host.
    pub fn new_async(value: T) -> Result<Self> {
        Self::with_config(value, true, SchedulerConfig::default())
    }

    /// Creates a pipeline with an explicit mode and configuration.
    ///
    /// Async mode checks the configured capability up front.
    pub fn with_config(value: T, async_mode: bool, config: SchedulerConfig) -> Result<Self> {
        if async_mode {
            config.capability.ensure()?;
        }
        Ok(Self {
            async_mode,
            config,
            ..Self::new(value)
        })
    }

    /// Registers the error handler, replacing any earlier one.
    #[must_use]
    pub fn catch<H>(mut self, handler: H) -> Self
    where
        H: FnMut(&Error, &T) -> Recovery<T> + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Applies a callable stage to the current value.
    ///
    /// In async mode the stage runs inside a unit. A stopped pipeline skips
    /// the stage. Without a handler a failure is returned as
    /// [`ErrorKind::StageFailed`](crate::ErrorKind::StageFailed).
    pub fn pipe<F, E>(self, stage: F) -> Result<Self>
    where
        F: FnOnce(T) -> std::result::Result<T, E> + 'static,
        E: Into<BoxError> + 'static,
    {
        if self.async_mode {
            let config = self.config.clone();
            self.apply(StageKind::Async, move |value| {
                stage::run_in_unit(move |v| async move { stage(v) }, value, &config)
            })
        } else {
            self.apply(StageKind::Sync, move |value| stage::run_sync(stage, value))
        }
    }

    /// Replaces the current value with a literal. A stopped pipeline stays
    /// stopped.
    #[must_use]
    pub fn pipe_value(mut self, value: T) -> Self {
        if !self.stopped {
            self.stages_run += 1;
            self.value = Some(value);
        }
        self
    }

    /// Applies a stage that may suspend. It always runs inside a unit,
    /// whatever the pipeline's mode.
    pub fn pipe_async<F, Fut, E>(self, stage: F) -> Result<Self>
    where
        F: FnOnce(T) -> Fut + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + 'static,
        E: Into<BoxError> + 'static,
    {
        let config = self.config.clone();
        self.apply(StageKind::Async, move |value| {
            stage::run_in_unit(stage, value, &config)
        })
    }

    /// Applies a stage that may suspend, suspending the calling unit between
    /// attempts to drive the stage's own unit.
    ///
    /// Inside a scheduled task, sibling tasks keep making progress while
    /// the stage runs. Outside any unit there is nothing to yield to, and
    /// the stage is driven to termination like
    /// [`pipe_async`](Self::pipe_async).
    pub async fn pipe_cooperative<F, Fut, E>(mut self, stage: F) -> Result<Self>
    where
        F: FnOnce(T) -> Fut + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + 'static,
        E: Into<BoxError> + 'static,
    {
        let Some((index, value, before)) = self.begin() else {
            return Ok(self);
        };
        let outcome = stage::run_cooperative(stage, value, &self.config).await;
        self.settle(StageKind::Async, index, before, outcome)
    }

    fn apply<R>(mut self, kind: StageKind, run: R) -> Result<Self>
    where
        R: FnOnce(T) -> Result<T>,
    {
        let Some((index, value, before)) = self.begin() else {
            return Ok(self);
        };
        let outcome = run(value);
        self.settle(kind, index, before, outcome)
    }

    /// Takes the value for the next stage, with a backup copy when a handler
    /// may need it. `None` when the pipeline is stopped.
    fn begin(&mut self) -> Option<(usize, T, Option<T>)> {
        if self.stopped {
            return None;
        }
        let value = self.value.take()?;
        let index = self.stages_run;
        self.stages_run += 1;
        let before = self.handler.is_some().then(|| value.clone());
        Some((index, value, before))
    }

    fn settle(
        mut self,
        kind: StageKind,
        index: usize,
        before: Option<T>,
        outcome: Result<T>,
    ) -> Result<Self> {
        let err = match outcome {
            Ok(next) => {
                self.value = Some(next);
                return Ok(self);
            }
            Err(cause) => stage::normalize(kind, index, cause),
        };
        debug!(stage = index, kind = %kind, error = %err, "pipeline stage failed");

        let (Some(handler), Some(before)) = (self.handler.as_mut(), before) else {
            return Err(err);
        };
        let decision = handler(&err, &before);
        debug!(stage = index, decision = decision.as_str(), "pipeline recovery");
        match decision {
            Recovery::Stop => self.stopped = true,
            Recovery::LastState => {
                self.stopped = true;
                self.value = Some(before);
            }
            Recovery::Continue(value) => self.value = Some(value),
        }
        Ok(self)
    }

    /// Returns a copy of the current value. `None` after a
    /// [`Recovery::Stop`].
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.value.clone()
    }
}

impl<T> Pipeline<T> {
    /// Borrows the current value. `None` after a [`Recovery::Stop`].
    #[must_use]
    pub const fn result(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Consumes the pipeline, returning the current value.
    #[must_use]
    pub fn into_result(self) -> Option<T> {
        self.value
    }

    /// Returns `true` once a handler has halted the pipeline.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Returns `true` if callable stages run inside units.
    #[must_use]
    pub const fn is_async(&self) -> bool {
        self.async_mode
    }

    /// Number of stages applied so far, failed ones included.
    #[must_use]
    pub const fn stages_run(&self) -> usize {
        self.stages_run
    }
}

impl<T: fmt::Debug> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("value", &self.value)
            .field("stopped", &self.stopped)
            .field("async_mode", &self.async_mode)
            .field("stages_run", &self.stages_run)
            .field("handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}
