//! Scheduler and pipeline configuration.
//!
//! [`SchedulerConfig`] carries the drive timing, the failure policy and the
//! injected [`Capability`] verdict. With the `config-file` feature it can be
//! loaded from TOML, where durations are written in microseconds:
//!
//! ```toml
//! poll_interval_us = 5000
//! await_poll_delay_us = 100000
//! await_timeout_us = 2000000
//! failure_policy = "isolate"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::unit::Capability;

/// Default pause between round-robin passes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(5_000);

/// Default pause between attempts of a single-unit await.
pub const DEFAULT_AWAIT_POLL_DELAY: Duration = Duration::from_millis(100);

/// What a drive loop does when one task fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the whole drive and return the failure. Tasks not yet finished
    /// stay queued; results collected so far stay readable.
    #[default]
    Abort,
    /// Record the failure and keep driving the remaining tasks.
    Isolate,
}

/// Configuration for [`Scheduler`](crate::runtime::Scheduler) and
/// [`Pipeline`](crate::pipeline::Pipeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Pause after each full round-robin pass. Zero disables the pause.
    #[serde(rename = "poll_interval_us", with = "micros")]
    pub poll_interval: Duration,
    /// Pause between attempts in single-unit awaits.
    #[serde(rename = "await_poll_delay_us", with = "micros")]
    pub await_poll_delay: Duration,
    /// Timeout applied by [`Driver`](crate::runtime::Driver)s built from
    /// this config. `None` waits forever.
    #[serde(rename = "await_timeout_us", with = "micros_opt")]
    pub await_timeout: Option<Duration>,
    /// Behaviour of `run`/`until` when a task fails.
    pub failure_policy: FailurePolicy,
    /// Whether cooperative suspension is available. Not serialized; defaults
    /// to the cached process-wide probe.
    #[serde(skip)]
    pub capability: Capability,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            await_poll_delay: DEFAULT_AWAIT_POLL_DELAY,
            await_timeout: None,
            failure_policy: FailurePolicy::Abort,
            capability: Capability::detect(),
        }
    }
}

impl SchedulerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pause between round-robin passes.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the pause between single-unit await attempts.
    #[must_use]
    pub const fn await_poll_delay(mut self, delay: Duration) -> Self {
        self.await_poll_delay = delay;
        self
    }

    /// Sets the default await timeout.
    #[must_use]
    pub const fn await_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.await_timeout = timeout;
        self
    }

    /// Sets the failure policy.
    #[must_use]
    pub const fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Injects a capability verdict.
    #[must_use]
    pub const fn capability(mut self, capability: Capability) -> Self {
        self.capability = capability;
        self
    }

    /// Disables every pause: passes and await attempts follow back to back.
    #[must_use]
    pub const fn without_delays(self) -> Self {
        self.poll_interval(Duration::ZERO)
            .await_poll_delay(Duration::ZERO)
    }
}

#[cfg(feature = "config-file")]
mod file {
    use super::SchedulerConfig;
    use std::path::{Path, PathBuf};

    /// Errors from loading a configuration file.
    #[derive(Debug, thiserror::Error)]
    pub enum ConfigError {
        /// The file could not be read.
        #[error("failed to read config {path}: {source}")]
        Io {
            /// Path that was read.
            path: PathBuf,
            /// Underlying I/O error.
            #[source]
            source: std::io::Error,
        },
        /// The contents were not valid configuration TOML.
        #[error("invalid config: {0}")]
        Parse(#[from] toml::de::Error),
    }

    impl SchedulerConfig {
        /// Parses a configuration from TOML text.
        pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
            Ok(toml::from_str(text)?)
        }

        /// Loads a configuration from a TOML file.
        pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml_str(&text)
        }
    }
}

#[cfg(feature = "config-file")]
pub use file::ConfigError;

mod micros {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_micros().min(u128::from(u64::MAX)) as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_micros)
    }
}

mod micros_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(
        value: &Option<Duration>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_micros().min(u128::from(u64::MAX)) as u64)),
            None => s.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|v| v.map(Duration::from_micros))
    }
}
