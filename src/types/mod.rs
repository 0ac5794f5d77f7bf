//! Identifier types shared across the crate.

pub mod id;

pub use id::{TASK_PREFIX, TaskId, UnitId};
