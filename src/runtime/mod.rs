//! Runtime: scheduling and driving units.
//!
//! - [`Scheduler`]: owns named tasks, drives them round-robin or in order
//! - [`Driver`]: drives a single unit, blocking or cooperatively
//! - [`Promise`]: promise-style view of an awaited outcome
//! - [`yield_now`]: voluntary suspension point

mod driver;
mod promise;
mod results;
mod scheduler;
mod task;
mod yield_now;

pub use driver::{
    Driver, await_cooperative, await_promise, await_promise_cooperative, await_task, defer,
};
pub use promise::Promise;
pub use results::ResultSet;
pub use scheduler::Scheduler;
pub use task::{TaskInput, TaskRef};
pub use yield_now::{YieldNow, yield_now};
