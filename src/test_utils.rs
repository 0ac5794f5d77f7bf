//! Shared helpers for unit and integration tests.
//!
//! Tests call [`init_test_logging`] first, then bracket their body with
//! [`test_phase!`](crate::test_phase) and
//! [`test_complete!`](crate::test_complete). Assertions that benefit from a
//! logged expected/actual pair use
//! [`assert_with_log!`](crate::assert_with_log).

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a test subscriber honouring `RUST_LOG`, once per process.
///
/// Output goes through the test writer so it is captured per test. Without
/// `tracing-subscriber` available this does nothing.
pub fn init_test_logging() {
    INIT.call_once(|| {
        #[cfg(feature = "test-internals")]
        {
            let filter = tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fibersync=debug"));
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_test_writer()
                .try_init();
        }
    });
}

/// Logs the start of a named test phase.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        $crate::test_utils::__log_line("phase", $name, "")
    };
}

/// Logs a named section inside a test.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        $crate::test_utils::__log_line("section", $name, "")
    };
}

/// Logs successful completion of a test, with optional `key = value` fields.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        $crate::test_utils::__log_line("complete", $name, "")
    };
    ($name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        $crate::test_utils::__log_line(
            "complete",
            $name,
            &[$(format!("{}={:?}", stringify!($key), $value)),+].join(" "),
        )
    };
}

/// Asserts `cond`, logging the expected and actual values first.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr $(,)?) => {{
        let expected = format!("{:?}", $expected);
        let actual = format!("{:?}", $actual);
        $crate::test_utils::__log_line(
            "assert",
            $msg,
            &format!("expected={expected} actual={actual}"),
        );
        assert!($cond, "{}: expected {}, got {}", $msg, expected, actual);
    }};
}

#[doc(hidden)]
pub fn __log_line(kind: &str, name: &str, detail: &str) {
    #[cfg(feature = "test-internals")]
    {
        if detail.is_empty() {
            tracing::info!(kind, name, "test event");
        } else {
            tracing::info!(kind, name, detail, "test event");
        }
    }
    #[cfg(not(feature = "test-internals"))]
    {
        let _ = (kind, name, detail);
    }
}
