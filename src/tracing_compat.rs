//! Logging facade.
//!
//! With the `tracing-integration` feature the macros here are the `tracing`
//! crate's own. Without it they expand to nothing, so call sites carry no
//! cost and need no `cfg` of their own.

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    /// No-op stand-in for `tracing::trace!`.
    #[macro_export]
    #[doc(hidden)]
    macro_rules! __fibersync_trace {
        ($($arg:tt)*) => {};
    }

    /// No-op stand-in for `tracing::debug!`.
    #[macro_export]
    #[doc(hidden)]
    macro_rules! __fibersync_debug {
        ($($arg:tt)*) => {};
    }

    /// No-op stand-in for `tracing::info!`.
    #[macro_export]
    #[doc(hidden)]
    macro_rules! __fibersync_info {
        ($($arg:tt)*) => {};
    }

    /// No-op stand-in for `tracing::warn!`.
    #[macro_export]
    #[doc(hidden)]
    macro_rules! __fibersync_warn {
        ($($arg:tt)*) => {};
    }

    /// No-op stand-in for `tracing::error!`.
    #[macro_export]
    #[doc(hidden)]
    macro_rules! __fibersync_error {
        ($($arg:tt)*) => {};
    }

    pub use crate::__fibersync_debug as debug;
    pub use crate::__fibersync_error as error;
    pub use crate::__fibersync_info as info;
    pub use crate::__fibersync_trace as trace;
    pub use crate::__fibersync_warn as warn;
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::{debug, error, info, trace, warn};
