//! Task id sources.
//!
//! The scheduler asks its [`IdSource`] for a fresh id on every
//! [`enqueue`](crate::runtime::Scheduler::enqueue). Production code uses
//! [`EntropyIds`], whose ids stay unique across scheduler instances;
//! tests inject [`SequentialIds`] to assert exact ids.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::TaskId;

/// Core trait for task id providers.
pub trait IdSource: 'static {
    /// Returns the next id. Successive calls never repeat.
    fn next_id(&self) -> TaskId;

    /// Stable identifier for tracing and diagnostics.
    fn source_id(&self) -> &'static str;
}

static PROCESS_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Wall-clock, counter and OS-entropy backed ids.
///
/// Ids look like `18c2f0a9b3e41c00-2a-9f03c1d7`: nanoseconds since the Unix
/// epoch, a process-wide counter and 32 random bits, all in hex. The
/// counter alone keeps ids unique within the process; the other two parts
/// keep them apart across processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntropyIds;

impl EntropyIds {
    fn random_bits(fallback: u64) -> u32 {
        let mut buf = [0u8; 4];
        if getrandom::fill(&mut buf).is_ok() {
            u32::from_le_bytes(buf)
        } else {
            mix(fallback) as u32
        }
    }
}

impl IdSource for EntropyIds {
    fn next_id(&self) -> TaskId {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos() as u64);
        let counter = PROCESS_COUNTER.fetch_add(1, Ordering::Relaxed);
        let random = Self::random_bits(nanos ^ counter);
        TaskId::from(format!("{nanos:x}-{counter:x}-{random:08x}"))
    }

    fn source_id(&self) -> &'static str {
        "entropy"
    }
}

/// Deterministic ids `{prefix}{n}` for tests and replay.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: &'static str,
    next: AtomicU64,
}

impl SequentialIds {
    /// Creates a source yielding `id_0`, `id_1`, ...
    #[must_use]
    pub const fn new() -> Self {
        Self::with_prefix("id_")
    }

    /// Creates a source yielding `{prefix}0`, `{prefix}1`, ...
    #[must_use]
    pub const fn with_prefix(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(0),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSource for SequentialIds {
    fn next_id(&self) -> TaskId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        TaskId::from(format!("{}{n}", self.prefix))
    }

    fn source_id(&self) -> &'static str {
        "sequential"
    }
}

fn mix(mut seed: u64) -> u64 {
    seed ^= seed >> 30;
    seed = seed.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    seed ^= seed >> 27;
    seed = seed.wrapping_mul(0x94d0_49bb_1331_11eb);
    seed ^ (seed >> 31)
}
