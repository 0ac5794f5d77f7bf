//! Scheduler benchmark suite.
//!
//! Measures:
//! - Round-robin drive cost as the number of tasks grows
//! - Sequential drive cost for the same workloads
//! - Raw suspend/resume round trip of a single unit
//! - Pipeline stage overhead, sync versus unit-backed
//!
//! Run:
//!   cargo bench --bench scheduler_benchmark

#![allow(missing_docs)]

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use fibersync::pipeline::Pipeline;
use fibersync::runtime::{Scheduler, TaskInput};
use fibersync::unit::{Unit, suspend};
use fibersync::{BoxError, Error, SchedulerConfig};

fn quiet() -> SchedulerConfig {
    SchedulerConfig::new().without_delays()
}

fn stepping(suspensions: u32) -> TaskInput<u32> {
    TaskInput::new(move || async move {
        for _ in 0..suspensions {
            suspend().await?;
        }
        Ok::<_, Error>(suspensions)
    })
}

// =============================================================================
// DRIVE POLICIES
// =============================================================================

fn bench_drive_policies(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/drive");
    for &tasks in &[10_u32, 100, 1_000] {
        group.throughput(Throughput::Elements(u64::from(tasks)));
        group.bench_with_input(BenchmarkId::new("run", tasks), &tasks, |b, &tasks| {
            b.iter_batched(
                || {
                    let scheduler = Scheduler::with_config(quiet()).expect("scheduler");
                    scheduler.load((0..tasks).map(|i| stepping(i % 8)));
                    scheduler
                },
                |scheduler| {
                    scheduler.run().expect("run");
                    black_box(scheduler.results().len())
                },
                BatchSize::SmallInput,
            );
        });
        group.bench_with_input(BenchmarkId::new("until", tasks), &tasks, |b, &tasks| {
            b.iter_batched(
                || {
                    let scheduler = Scheduler::with_config(quiet()).expect("scheduler");
                    scheduler.load((0..tasks).map(|i| stepping(i % 8)));
                    scheduler
                },
                |scheduler| {
                    scheduler.until().expect("until");
                    black_box(scheduler.results().len())
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

// =============================================================================
// UNIT ROUND TRIP
// =============================================================================

fn bench_unit_round_trip(c: &mut Criterion) {
    c.bench_function("unit/suspend_resume_round_trip", |b| {
        b.iter_batched(
            || {
                Unit::new(|| async {
                    let injected = fibersync::unit::suspend_with(1_u64).await?;
                    Ok::<_, Error>(injected.is_some())
                })
            },
            |mut unit| {
                unit.start().expect("start");
                unit.resume_with(2_u64).expect("resume");
                black_box(unit.take_return().expect("return"))
            },
            BatchSize::SmallInput,
        );
    });
}

// =============================================================================
// PIPELINE
// =============================================================================

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/stages");
    group.bench_function("sync", |b| {
        b.iter(|| {
            let mut pipeline = Pipeline::new(0_u64);
            for _ in 0..16 {
                pipeline = pipeline
                    .pipe(|v| Ok::<_, BoxError>(v + 1))
                    .expect("stage");
            }
            black_box(pipeline.into_result())
        });
    });
    group.bench_function("async_mode", |b| {
        b.iter(|| {
            let mut pipeline = Pipeline::with_config(0_u64, true, quiet()).expect("async");
            for _ in 0..16 {
                pipeline = pipeline
                    .pipe(|v| Ok::<_, BoxError>(v + 1))
                    .expect("stage");
            }
            black_box(pipeline.into_result())
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_drive_policies,
    bench_unit_round_trip,
    bench_pipeline
);
criterion_main!(benches);
