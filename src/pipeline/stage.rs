//! Stage execution and error recovery decisions.

use std::future::Future;

use crate::config::SchedulerConfig;
use crate::error::{BoxError, Error, Result, StageKind};
use crate::runtime::Driver;
use crate::unit::{Unit, in_unit};

/// What a pipeline does after a stage fails, as decided by its handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery<T> {
    /// Halt. Later stages are skipped and the result reads as `None`.
    Stop,
    /// Halt, keeping the value from just before the failing stage.
    LastState,
    /// Continue as if the failing stage had returned this value.
    Continue(T),
}

impl<T> Recovery<T> {
    /// Returns `true` for the variants that halt the pipeline.
    #[must_use]
    pub const fn halts(&self) -> bool {
        matches!(self, Self::Stop | Self::LastState)
    }

    #[cfg_attr(not(feature = "tracing-integration"), allow(dead_code))]
    pub(crate) const fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::LastState => "last_state",
            Self::Continue(_) => "continue",
        }
    }
}

/// The error handler registered with [`Pipeline::catch`](super::Pipeline::catch).
///
/// Receives the normalized stage error and the value the failing stage was
/// given.
pub(crate) type Handler<T> = Box<dyn FnMut(&Error, &T) -> Recovery<T>>;

/// Runs a synchronous stage on the caller's stack.
pub(crate) fn run_sync<T, F, E>(stage: F, value: T) -> Result<T>
where
    F: FnOnce(T) -> std::result::Result<T, E>,
    E: Into<BoxError>,
{
    stage(value).map_err(Error::task_failed)
}

/// Runs a stage inside a unit seeded with `value`, blocking until the unit
/// terminates.
pub(crate) fn run_in_unit<T, F, Fut, E>(
    stage: F,
    value: T,
    config: &SchedulerConfig,
) -> Result<T>
where
    T: 'static,
    F: FnOnce(T) -> Fut + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + 'static,
    E: Into<BoxError> + 'static,
{
    config.capability.ensure()?;
    let mut unit = Unit::new(move || stage(value));
    Driver::from_config(config).drive(&mut unit)
}

/// Runs a stage inside a unit seeded with `value`. Inside a running unit
/// the caller is suspended between attempts; outside one the stage's unit
/// is driven like [`run_in_unit`].
pub(crate) async fn run_cooperative<T, F, Fut, E>(
    stage: F,
    value: T,
    config: &SchedulerConfig,
) -> Result<T>
where
    T: 'static,
    F: FnOnce(T) -> Fut + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + 'static,
    E: Into<BoxError> + 'static,
{
    config.capability.ensure()?;
    let mut unit = Unit::new(move || stage(value));
    let driver = Driver::from_config(config);
    if in_unit() {
        driver.drive_cooperative(&mut unit).await
    } else {
        driver.drive(&mut unit)
    }
}

/// Wraps a stage failure with its position and kind.
pub(crate) fn normalize(kind: StageKind, index: usize, err: Error) -> Error {
    if err.is_capability_unavailable() {
        return err;
    }
    Error::stage_failed(kind, index, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{Capability, suspend};

    #[test]
    fn halting_variants() {
        assert!(Recovery::<i32>::Stop.halts());
        assert!(Recovery::<i32>::LastState.halts());
        assert!(!Recovery::Continue(1).halts());
        assert_eq!(Recovery::Continue(1).as_str(), "continue");
    }

    #[test]
    fn unit_stage_can_suspend() {
        let config = SchedulerConfig::new().without_delays();
        let out = run_in_unit(
            |v: i32| async move {
                suspend().await?;
                Ok::<_, Error>(v * 3)
            },
            4,
            &config,
        )
        .expect("stage");
        assert_eq!(out, 12);
    }

    #[test]
    fn cooperative_stage_suspends_the_caller() {
        let config = SchedulerConfig::new().without_delays();
        let mut caller = Unit::new(move || async move {
            run_cooperative(
                |v: i32| async move {
                    suspend().await?;
                    suspend().await?;
                    Ok::<_, Error>(v + 1)
                },
                1,
                &config,
            )
            .await
        });
        let mut suspensions = 0;
        while !Driver::advance(&mut caller).expect("advance").is_terminated() {
            suspensions += 1;
        }
        assert_eq!(caller.take_return().ok(), Some(2));
        assert_eq!(suspensions, 2);
    }

    #[test]
    fn unit_stage_needs_capability() {
        let config = SchedulerConfig::new().capability(Capability::unavailable("off"));
        let err = run_in_unit(|v: i32| async move { Ok::<_, Error>(v) }, 1, &config)
            .expect_err("capability");
        let err = normalize(StageKind::Async, 0, err);
        assert!(err.is_capability_unavailable());
    }

    #[test]
    fn normalized_failure_keeps_kind_and_cause() {
        let err = run_sync(|_: i32| Err::<i32, _>(BoxError::from("nope")), 1).expect_err("fails");
        let err = normalize(StageKind::Sync, 2, err);
        assert!(err.is_stage_failure());
        assert_eq!(err.stage_kind(), Some(StageKind::Sync));
        assert!(err.to_string().contains("nope"));
    }
}
