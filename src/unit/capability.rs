//! Capability probe for cooperative suspension.
//!
//! The probe runs once per process and its verdict is cached. Consumers do
//! not consult the cache directly: the verdict travels inside
//! [`SchedulerConfig`](crate::config::SchedulerConfig), so a test can hand a
//! scheduler or pipeline an [`Capability::unavailable`] value and observe
//! the fail-fast path.

use std::sync::OnceLock;

use super::{Step, Unit, suspend_with};
use crate::error::{Error, Result};

static PROBED: OnceLock<Capability> = OnceLock::new();

const PROBE_YIELD: u32 = 0x5eed;
const PROBE_INJECT: u32 = 0xacc0;

/// Whether units can suspend and resume on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Suspension round trips work.
    Available,
    /// Suspension is not supported, with the reason found by the probe.
    Unavailable(&'static str),
}

impl Capability {
    /// Returns the cached process-wide probe verdict, probing on first use.
    #[must_use]
    pub fn detect() -> Self {
        *PROBED.get_or_init(Self::probe)
    }

    /// Drives a probe unit through one suspend/resume round trip, passing a
    /// value in each direction.
    #[must_use]
    pub fn probe() -> Self {
        let mut unit = Unit::new(|| async {
            let injected = suspend_with(PROBE_YIELD).await?;
            Ok::<_, Error>(injected.and_then(|p| p.downcast::<u32>().ok()))
        });

        match unit.start() {
            Ok(Step::Suspended(Some(payload)))
                if payload.downcast_ref::<u32>() == Some(&PROBE_YIELD) => {}
            Ok(Step::Suspended(_)) => return Self::Unavailable("yielded value was lost"),
            Ok(Step::Terminated) => return Self::Unavailable("unit did not suspend"),
            Err(_) => return Self::Unavailable("probe unit failed to start"),
        }
        if !matches!(unit.resume_with(PROBE_INJECT), Ok(Step::Terminated)) {
            return Self::Unavailable("unit did not terminate after resume");
        }
        match unit.take_return() {
            Ok(Some(PROBE_INJECT)) => Self::Available,
            _ => Self::Unavailable("injected value was lost"),
        }
    }

    /// Creates an unavailable verdict, for embedding or tests.
    #[must_use]
    pub const fn unavailable(reason: &'static str) -> Self {
        Self::Unavailable(reason)
    }

    /// Returns `true` if units can suspend.
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Available)
    }

    /// Fails with [`ErrorKind::CapabilityUnavailable`](crate::ErrorKind::CapabilityUnavailable)
    /// when suspension is unsupported.
    pub fn ensure(self) -> Result<()> {
        match self {
            Self::Available => Ok(()),
            Self::Unavailable(reason) => Err(Error::capability_unavailable(reason)),
        }
    }
}

impl Default for Capability {
    fn default() -> Self {
        Self::detect()
    }
}
