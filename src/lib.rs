//! Fibersync: cooperative single-threaded task scheduling and value pipelines.
//!
//! # Overview
//!
//! Fibersync runs many suspendable computations on one thread. A computation
//! gives up control only at explicit suspension points; whoever drives it
//! decides when it continues, and may pass a value back in when it does.
//! There is no preemption and no I/O readiness: progress happens because a
//! driver keeps resuming units.
//!
//! # Core Pieces
//!
//! - **Units**: one-shot resumable computations with values flowing both
//!   ways across each suspension point
//! - **Scheduler**: named tasks driven round-robin ([`Scheduler::run`]) or
//!   strictly in order ([`Scheduler::until`]), results collected by id
//! - **Awaiting**: drive a single unit to completion with an optional
//!   deadline, as a plain result or a [`Promise`]
//! - **Pipeline**: a value threaded through ordered stages with one error
//!   handler deciding between stop, keep-last-state and recover
//!
//! # Module Structure
//!
//! - [`unit`]: the suspendable unit, suspension points and the capability probe
//! - [`runtime`]: scheduler, driver, promises and `yield_now`
//! - [`time`]: clocks, cooperative sleeps and timers
//! - [`pipeline`]: staged value pipelines
//! - [`config`]: scheduler and pipeline configuration
//! - [`error`](mod@error): error types
//! - [`types`]: identifiers
//! - [`util`]: id generators
//! - [`tracing_compat`]: optional tracing integration (requires `tracing-integration` feature)
//!
//! # Example
//!
//! ```
//! use fibersync::runtime::{Scheduler, TaskInput};
//! use fibersync::{BoxError, SchedulerConfig};
//!
//! let scheduler = Scheduler::with_config(SchedulerConfig::new().without_delays())?;
//! scheduler.load([
//!     TaskInput::new(|| async {
//!         fibersync::runtime::yield_now().await;
//!         Ok::<_, BoxError>("slow")
//!     }),
//!     TaskInput::from_fn(|| Ok::<_, BoxError>("fast")),
//! ]);
//! scheduler.run()?;
//!
//! let order: Vec<_> = scheduler.results().ids().map(|id| id.to_string()).collect();
//! assert_eq!(order, ["task_1", "task_0"]);
//! # Ok::<(), fibersync::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod config;
pub mod error;
pub mod pipeline;
pub mod runtime;
pub mod time;
pub mod tracing_compat;
pub mod types;
pub mod unit;
pub mod util;

// ── Test-only modules ───────────────────────────────────────────────────
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

#[cfg(feature = "config-file")]
pub use config::ConfigError;
pub use config::{FailurePolicy, SchedulerConfig};
pub use error::{BoxError, Error, ErrorKind, PanicError, Result, StageKind};
pub use pipeline::{Pipeline, Recovery};
pub use runtime::{Driver, Promise, Scheduler, TaskInput, TaskRef};
pub use types::{TaskId, UnitId};
pub use unit::{Capability, Unit};
