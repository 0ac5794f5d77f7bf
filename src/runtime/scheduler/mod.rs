//! Task scheduler.
//!
//! A [`Scheduler`] owns an ordered collection of named tasks and drives them
//! to completion with one of two policies:
//!
//! - [`run`](Scheduler::run): cooperative round-robin. Each pass starts or
//!   resumes every pending task once, in queue order, then sleeps
//!   `poll_interval`. Results are recorded in completion order.
//! - [`until`](Scheduler::until): strict sequential. Each task is driven to
//!   termination before the next one starts.
//!
//! Both take `&self`, so a task holding a shared handle to its own scheduler
//! can observe it. Calling `run`/`until` again while a drive is in progress
//! fails with [`ErrorKind::AlreadyRunning`](crate::ErrorKind::AlreadyRunning).
//! Other mutation from inside a drive (from a task body or an `on_each`
//! callback) does not corrupt the scheduler, but which pass observes it is
//! unspecified.
//!
//! Results persist across drives until [`clear_results`](Scheduler::clear_results)
//! or [`reset`](Scheduler::reset).

mod queue;

use std::cell::{Cell, Ref, RefCell};
use std::fmt;

use crate::config::{FailurePolicy, SchedulerConfig};
use crate::error::{Error, Result};
use crate::tracing_compat::{debug, trace, warn};
use crate::types::TaskId;
use crate::unit::Step;
use crate::util::{EntropyIds, IdSource};

use super::driver::Driver;
use super::results::ResultSet;
use super::task::{TaskInput, TaskRef};
use queue::TaskQueue;

/// Clears the running flag when a drive ends, however it ends.
struct RunGuard<'a> {
    running: &'a Cell<bool>,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a Cell<bool>) -> Result<Self> {
        if running.replace(true) {
            return Err(Error::already_running());
        }
        Ok(Self { running })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.set(false);
    }
}

/// Single-threaded cooperative scheduler for units producing `T`.
pub struct Scheduler<T> {
    tasks: RefCell<TaskQueue<T>>,
    results: RefCell<ResultSet<T>>,
    failures: RefCell<Vec<(TaskId, Error)>>,
    running: Cell<bool>,
    config: SchedulerConfig,
    ids: Box<dyn IdSource>,
}

impl<T: 'static> Scheduler<T> {
    /// Creates an empty scheduler with the default configuration.
    ///
    /// Fails with [`ErrorKind::CapabilityUnavailable`](crate::ErrorKind::CapabilityUnavailable)
    /// when units cannot suspend on this host.
    pub fn new() -> Result<Self> {
        Self::with_config(SchedulerConfig::default())
    }

    /// Creates an empty scheduler.
    ///
    /// The capability carried by `config` is checked here, so a host without
    /// suspension support fails at construction rather than at first drive.
    pub fn with_config(config: SchedulerConfig) -> Result<Self> {
        config.capability.ensure()?;
        Ok(Self {
            tasks: RefCell::new(TaskQueue::new()),
            results: RefCell::new(ResultSet::new()),
            failures: RefCell::new(Vec::new()),
            running: Cell::new(false),
            config,
            ids: Box::new(EntropyIds),
        })
    }

    /// Creates a scheduler holding `tasks` under the ids `task_0`,
    /// `task_1`, ...
    pub fn from_tasks<I>(tasks: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<TaskInput<T>>,
    {
        let scheduler = Self::new()?;
        scheduler.load(tasks);
        Ok(scheduler)
    }

    /// Creates a scheduler holding keyed tasks. See [`load_named`](Self::load_named)
    /// for how keys become ids.
    pub fn from_named<I, K>(tasks: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, TaskInput<T>)>,
        K: Into<TaskId>,
    {
        let scheduler = Self::new()?;
        scheduler.load_named(tasks);
        Ok(scheduler)
    }

    /// Replaces the id generator used by [`enqueue`](Self::enqueue).
    #[must_use]
    pub fn with_id_source(mut self, ids: impl IdSource) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Adds a list of tasks under positional ids `task_{n}`, `n` counting
    /// from zero within `tasks`. An id already queued is replaced in place.
    pub fn load<I>(&self, tasks: I)
    where
        I: IntoIterator,
        I::Item: Into<TaskInput<T>>,
    {
        let mut queue = self.tasks.borrow_mut();
        for (n, task) in tasks.into_iter().enumerate() {
            queue.insert(TaskId::positional(n), task.into().into_unit());
        }
    }

    /// Adds keyed tasks.
    ///
    /// Keys are kept as ids, except that keys reading exactly `"0"`, `"1"`,
    /// ... in order are coerced to the positional scheme `task_0`,
    /// `task_1`, ... so a sequential map loads like a list.
    pub fn load_named<I, K>(&self, tasks: I)
    where
        I: IntoIterator<Item = (K, TaskInput<T>)>,
        K: Into<TaskId>,
    {
        let tasks: Vec<(TaskId, TaskInput<T>)> =
            tasks.into_iter().map(|(k, t)| (k.into(), t)).collect();
        let sequential = tasks
            .iter()
            .enumerate()
            .all(|(n, (id, _))| id.as_str().parse::<usize>().ok() == Some(n));
        let mut queue = self.tasks.borrow_mut();
        for (n, (id, task)) in tasks.into_iter().enumerate() {
            let id = if sequential { TaskId::positional(n) } else { id };
            queue.insert(id, task.into_unit());
        }
    }

    /// Appends a task under a freshly generated id and returns the id.
    ///
    /// The id is never one already present in the queue or the results.
    pub fn enqueue(&self, task: impl Into<TaskInput<T>>) -> TaskId {
        let id = self.fresh_id();
        self.tasks
            .borrow_mut()
            .insert(id.clone(), task.into().into_unit());
        trace!(task = %id, "task enqueued");
        id
    }

    fn fresh_id(&self) -> TaskId {
        loop {
            let id = self.ids.next_id();
            let taken =
                self.tasks.borrow().contains(&id) || self.results.borrow().contains(id.as_str());
            if !taken {
                return id;
            }
        }
    }
}

impl<T> Scheduler<T> {
    /// Removes a task by id or position. Partial progress of a started task
    /// is discarded.
    pub fn dequeue(&self, task: impl Into<TaskRef>) -> bool {
        let id = task.into().to_id();
        self.tasks.borrow_mut().remove(&id)
    }

    /// Moves a task to the head of the queue without touching its state.
    pub fn prioritize(&self, task: impl Into<TaskRef>) -> bool {
        let id = task.into().to_id();
        self.tasks.borrow_mut().prioritize(&id)
    }

    /// Drops placeholder entries. Returns `false` if the queue is empty.
    pub fn reindex(&self) -> bool {
        self.tasks.borrow_mut().reindex()
    }

    /// Removes every queued task. Results are kept.
    pub fn clear(&self) {
        self.tasks.borrow_mut().clear();
    }

    /// Forgets collected results and recorded failures.
    pub fn clear_results(&self) {
        self.results.borrow_mut().clear();
        self.failures.borrow_mut().clear();
    }

    /// Removes tasks, results and failures.
    pub fn reset(&self) {
        self.clear();
        self.clear_results();
    }

    /// Returns `true` if no task is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Returns `true` if a task with this id or position is queued.
    #[must_use]
    pub fn contains(&self, task: impl Into<TaskRef>) -> bool {
        self.tasks.borrow().contains(&task.into().to_id())
    }

    /// Ids of the queued tasks, in drive order.
    #[must_use]
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.borrow().ids()
    }

    /// Returns `true` while `run` or `until` is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Borrows the collected results.
    ///
    /// The borrow must end before the next drive or result mutation.
    #[must_use]
    pub fn results(&self) -> Ref<'_, ResultSet<T>> {
        self.results.borrow()
    }

    /// Takes the collected results, leaving the set empty.
    #[must_use]
    pub fn take_results(&self) -> ResultSet<T> {
        std::mem::take(&mut *self.results.borrow_mut())
    }

    /// Borrows the `(id, error)` pairs recorded under
    /// [`FailurePolicy::Isolate`], in failure order.
    #[must_use]
    pub fn failures(&self) -> Ref<'_, Vec<(TaskId, Error)>> {
        self.failures.borrow()
    }

    /// Takes the failures recorded under [`FailurePolicy::Isolate`].
    #[must_use]
    pub fn take_failures(&self) -> Vec<(TaskId, Error)> {
        std::mem::take(&mut *self.failures.borrow_mut())
    }

    /// Number of failures recorded under [`FailurePolicy::Isolate`].
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.borrow().len()
    }

    /// Ids of the tasks that failed under [`FailurePolicy::Isolate`].
    #[must_use]
    pub fn failed_ids(&self) -> Vec<TaskId> {
        self.failures
            .borrow()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Drives every queued task round-robin until none is left.
    pub fn run(&self) -> Result<()> {
        self.run_each(|_, _| {})
    }

    /// Like [`run`](Self::run), calling `on_each(value, id)` as each task
    /// terminates, before its value is recorded.
    pub fn run_each<F>(&self, mut on_each: F) -> Result<()>
    where
        F: FnMut(&T, &TaskId),
    {
        self.config.capability.ensure()?;
        let _guard = RunGuard::acquire(&self.running)?;
        debug!(tasks = self.len(), "round-robin drive starting");

        #[cfg_attr(
            not(feature = "tracing-integration"),
            allow(unused_variables, unused_assignments)
        )]
        let mut passes = 0_u64;
        loop {
            let pass = self.tasks.borrow().pending();
            if pass.is_empty() {
                break;
            }
            passes += 1;
            for id in pass {
                let Some(mut unit) = self.tasks.borrow_mut().take(&id) else {
                    continue;
                };
                match Driver::advance(&mut unit) {
                    Ok(Step::Suspended(_)) => {
                        // A task dequeued mid-step is discarded here.
                        let _ = self.tasks.borrow_mut().restore(&id, unit);
                    }
                    Ok(Step::Terminated) => {
                        self.tasks.borrow_mut().remove(&id);
                        match unit.take_return() {
                            Ok(value) => self.complete(id, value, &mut on_each),
                            Err(err) => self.task_failed(id, err)?,
                        }
                    }
                    Err(err) => {
                        self.tasks.borrow_mut().remove(&id);
                        self.task_failed(id, err)?;
                    }
                }
            }
            let more = self.tasks.borrow().first_pending().is_some();
            if more && !self.config.poll_interval.is_zero() {
                std::thread::sleep(self.config.poll_interval);
            }
        }

        debug!(
            passes,
            results = self.results.borrow().len(),
            failures = self.failure_count(),
            "round-robin drive finished"
        );
        Ok(())
    }

    /// Drives queued tasks one at a time, in order, each to termination
    /// before the next starts.
    pub fn until(&self) -> Result<()> {
        self.until_each(|_, _| {})
    }

    /// Like [`until`](Self::until), calling `on_each(value, id)` as each task
    /// terminates, before its value is recorded.
    ///
    /// Each task is driven like [`Driver::drive`]: attempts are separated by
    /// `poll_interval` and bounded by `await_timeout`, if set.
    pub fn until_each<F>(&self, mut on_each: F) -> Result<()>
    where
        F: FnMut(&T, &TaskId),
    {
        self.config.capability.ensure()?;
        let _guard = RunGuard::acquire(&self.running)?;
        debug!(tasks = self.len(), "sequential drive starting");

        let driver = Driver::from_config(&self.config).poll_delay(self.config.poll_interval);
        loop {
            let Some(id) = self.tasks.borrow().first_pending() else {
                break;
            };
            let Some(mut unit) = self.tasks.borrow_mut().take(&id) else {
                break;
            };
            let outcome = driver.drive(&mut unit);
            self.tasks.borrow_mut().remove(&id);
            match outcome {
                Ok(value) => self.complete(id, value, &mut on_each),
                Err(err) => self.task_failed(id, err)?,
            }
        }

        debug!(
            results = self.results.borrow().len(),
            failures = self.failure_count(),
            "sequential drive finished"
        );
        Ok(())
    }

    fn complete<F>(&self, id: TaskId, value: T, on_each: &mut F)
    where
        F: FnMut(&T, &TaskId),
    {
        trace!(task = %id, "task completed");
        on_each(&value, &id);
        self.results.borrow_mut().insert(id, value);
    }

    fn task_failed(&self, id: TaskId, err: Error) -> Result<()> {
        let err = err.with_task(id.clone());
        warn!(task = %id, error = %err, "task failed");
        match self.config.failure_policy {
            FailurePolicy::Abort => Err(err),
            FailurePolicy::Isolate => {
                self.failures.borrow_mut().push((id, err));
                Ok(())
            }
        }
    }
}

impl<T: Clone> Scheduler<T> {
    /// Returns a copy of the value recorded for a task.
    #[must_use]
    pub fn result(&self, task: impl Into<TaskRef>) -> Option<T> {
        let id = task.into().to_id();
        self.results.borrow().get(id.as_str()).cloned()
    }
}

impl<T> fmt::Debug for Scheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.task_ids())
            .field("results", &self.results.borrow().len())
            .field("failures", &self.failure_count())
            .field("running", &self.running.get())
            .field("id_source", &self.ids.source_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
impl<T> Scheduler<T> {
    /// Takes a queued unit out, leaving a placeholder.
    fn take_unit(&self, task: impl Into<TaskRef>) -> Option<crate::unit::Unit<T>> {
        self.tasks.borrow_mut().take(&task.into().to_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::unit::{Capability, suspend};
    use crate::util::SequentialIds;
    use std::rc::Rc;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    fn quiet() -> SchedulerConfig {
        SchedulerConfig::new().without_delays()
    }

    fn stepping(
        label: &'static str,
        steps: u32,
        log: Rc<RefCell<Vec<String>>>,
    ) -> TaskInput<String> {
        TaskInput::new(move || async move {
            for n in 0..steps {
                log.borrow_mut().push(format!("{label}{n}"));
                suspend().await?;
            }
            Ok::<_, Error>(label.to_string())
        })
    }

    #[test]
    fn unavailable_capability_fails_construction() {
        init_test("unavailable_capability_fails_construction");
        let config = quiet().capability(Capability::unavailable("no suspension"));
        let err = Scheduler::<()>::with_config(config).expect_err("fails fast");
        crate::assert_with_log!(
            err.is_capability_unavailable(),
            "capability error",
            true,
            err.is_capability_unavailable()
        );
        crate::test_complete!("unavailable_capability_fails_construction");
    }

    #[test]
    fn run_interleaves_and_records_completion_order() {
        init_test("run_interleaves_and_records_completion_order");
        let log = Rc::new(RefCell::new(Vec::new()));
        let scheduler = Scheduler::with_config(quiet()).expect("scheduler");
        scheduler.load([
            stepping("a", 3, Rc::clone(&log)),
            stepping("b", 1, Rc::clone(&log)),
        ]);
        scheduler.run().expect("run");

        assert_eq!(*log.borrow(), ["a0", "b0", "a1", "a2"]);
        let order: Vec<String> = scheduler.results().ids().map(ToString::to_string).collect();
        assert_eq!(order, ["task_1", "task_0"]);
        assert!(scheduler.is_empty());
        crate::test_complete!("run_interleaves_and_records_completion_order");
    }

    #[test]
    fn on_each_sees_value_before_it_is_recorded() {
        init_test("on_each_sees_value_before_it_is_recorded");
        let scheduler = Rc::new(
            Scheduler::with_config(quiet())
                .expect("scheduler")
                .with_id_source(SequentialIds::new()),
        );
        scheduler.enqueue(TaskInput::from_fn(|| Ok::<_, BoxError>(7)));
        let observer = Rc::clone(&scheduler);
        let mut seen = Vec::new();
        scheduler
            .run_each(|value, id| {
                seen.push((id.to_string(), *value, observer.results().contains(id.as_str())));
            })
            .expect("run");
        assert_eq!(seen, [("id_0".to_string(), 7, false)]);
        assert_eq!(scheduler.result("id_0"), Some(7));
        crate::test_complete!("on_each_sees_value_before_it_is_recorded");
    }

    #[test]
    fn reentrant_drive_is_rejected() {
        init_test("reentrant_drive_is_rejected");
        let scheduler: Rc<Scheduler<bool>> =
            Rc::new(Scheduler::with_config(quiet()).expect("scheduler"));
        let inner = Rc::clone(&scheduler);
        scheduler.enqueue(TaskInput::from_fn(move || {
            let run = inner.run().map_err(|e| e.kind());
            let until = inner.until().map_err(|e| e.kind());
            Ok::<_, BoxError>(
                run == Err(crate::ErrorKind::AlreadyRunning)
                    && until == Err(crate::ErrorKind::AlreadyRunning)
                    && inner.is_running(),
            )
        }));
        scheduler.run().expect("outer run");
        let values: Vec<bool> = scheduler.results().iter().map(|(_, v)| *v).collect();
        assert_eq!(values, [true]);
        assert!(!scheduler.is_running());
        crate::test_complete!("reentrant_drive_is_rejected");
    }

    #[test]
    fn abort_keeps_unfinished_tasks_queued() {
        init_test("abort_keeps_unfinished_tasks_queued");
        let scheduler = Scheduler::with_config(quiet()).expect("scheduler");
        scheduler.load([
            TaskInput::new(|| async {
                suspend().await?;
                Ok::<_, Error>(1)
            }),
            TaskInput::from_fn(|| Err::<i32, _>(BoxError::from("bad"))),
        ]);
        let err = scheduler.run().expect_err("second task fails");
        assert!(err.is_task_failure());
        assert_eq!(err.task().map(TaskId::as_str), Some("task_1"));
        assert_eq!(scheduler.task_ids(), vec![TaskId::from(0)]);

        scheduler.run().expect("resume remaining");
        assert_eq!(scheduler.result(0), Some(1));
        crate::test_complete!("abort_keeps_unfinished_tasks_queued");
    }

    #[test]
    fn isolate_records_failures_and_continues() {
        init_test("isolate_records_failures_and_continues");
        let config = quiet().failure_policy(FailurePolicy::Isolate);
        let scheduler = Scheduler::with_config(config).expect("scheduler");
        scheduler.load([
            TaskInput::from_fn(|| Err::<i32, _>(BoxError::from("first"))),
            TaskInput::from_fn(|| Ok::<_, BoxError>(2)),
            TaskInput::from_fn(|| -> std::result::Result<i32, BoxError> { panic!("third") }),
        ]);
        scheduler.until().expect("isolated");
        assert_eq!(scheduler.result(1), Some(2));
        assert_eq!(scheduler.failed_ids(), vec![TaskId::from(0), TaskId::from(2)]);
        let failures = scheduler.take_failures();
        assert!(failures.iter().all(|(_, e)| e.is_task_failure()));
        assert_eq!(scheduler.failure_count(), 0);
        crate::test_complete!("isolate_records_failures_and_continues");
    }

    #[test]
    fn results_accumulate_until_cleared() {
        init_test("results_accumulate_until_cleared");
        let scheduler = Scheduler::with_config(quiet())
            .expect("scheduler")
            .with_id_source(SequentialIds::with_prefix("job_"));
        scheduler.enqueue(TaskInput::from_fn(|| Ok::<_, BoxError>('a')));
        scheduler.run().expect("first");
        scheduler.enqueue(TaskInput::from_fn(|| Ok::<_, BoxError>('b')));
        scheduler.until().expect("second");
        assert_eq!(scheduler.results().len(), 2);

        scheduler.clear_results();
        assert!(scheduler.results().is_empty());
        scheduler.enqueue(TaskInput::from_fn(|| Ok::<_, BoxError>('c')));
        scheduler.reset();
        assert!(scheduler.is_empty());
        crate::test_complete!("results_accumulate_until_cleared");
    }

    #[test]
    fn enqueue_skips_ids_already_used() {
        init_test("enqueue_skips_ids_already_used");
        let scheduler = Scheduler::with_config(quiet())
            .expect("scheduler")
            .with_id_source(SequentialIds::new());
        scheduler.load_named([("id_0", TaskInput::from_fn(|| Ok::<_, BoxError>(0)))]);
        let id = scheduler.enqueue(TaskInput::from_fn(|| Ok::<_, BoxError>(1)));
        assert_eq!(id.as_str(), "id_1");
        crate::test_complete!("enqueue_skips_ids_already_used");
    }

    #[test]
    fn sequential_keys_are_coerced() {
        init_test("sequential_keys_are_coerced");
        let scheduler = Scheduler::with_config(quiet()).expect("scheduler");
        scheduler.load_named([
            ("0", TaskInput::from_fn(|| Ok::<_, BoxError>(0))),
            ("1", TaskInput::from_fn(|| Ok::<_, BoxError>(1))),
        ]);
        assert_eq!(scheduler.task_ids(), vec![TaskId::from(0), TaskId::from(1)]);

        let named = Scheduler::with_config(quiet()).expect("scheduler");
        named.load_named([
            ("1", TaskInput::from_fn(|| Ok::<_, BoxError>(1))),
            ("fetch", TaskInput::from_fn(|| Ok::<_, BoxError>(2))),
        ]);
        assert_eq!(named.task_ids(), vec![TaskId::from("1"), TaskId::from("fetch")]);
        crate::test_complete!("sequential_keys_are_coerced");
    }

    #[test]
    fn prioritize_changes_start_order() {
        init_test("prioritize_changes_start_order");
        let log = Rc::new(RefCell::new(Vec::new()));
        let scheduler = Scheduler::with_config(quiet()).expect("scheduler");
        scheduler.load([
            stepping("a", 1, Rc::clone(&log)),
            stepping("b", 1, Rc::clone(&log)),
        ]);
        assert!(scheduler.prioritize(1));
        assert!(!scheduler.prioritize("missing"));
        scheduler.until().expect("until");
        assert_eq!(*log.borrow(), ["b0", "a0"]);
        crate::test_complete!("prioritize_changes_start_order");
    }

    #[test]
    fn reindex_drops_placeholders() {
        init_test("reindex_drops_placeholders");
        let scheduler: Scheduler<u8> = Scheduler::with_config(quiet()).expect("scheduler");
        assert!(!scheduler.reindex());
        scheduler.load([
            TaskInput::from_fn(|| Ok::<_, BoxError>(0)),
            TaskInput::from_fn(|| Ok::<_, BoxError>(1)),
        ]);
        let unit = scheduler.take_unit(0).expect("queued");
        assert!(!unit.is_started());
        assert_eq!(scheduler.len(), 2);
        assert!(scheduler.reindex());
        assert_eq!(scheduler.task_ids(), vec![TaskId::from(1)]);
        crate::test_complete!("reindex_drops_placeholders");
    }
}
