//! Logging setup shared by the CLI and embedding applications.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! Tokens are never logged; see the redacted `Debug` impls in [`crate::session`].

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging at `warn`, overridable with `RUST_LOG`.
pub fn init() {
    init_with_level("warn")
}

/// Initialize logging with a specific default level
///
/// # Arguments
/// * `default_level` - Default filter directive (`debug`, `info`, `pawcare_core=debug`, ...)
///
/// `RUST_LOG` still wins when set. Calling this twice is harmless; the
/// first subscriber stays installed.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();
}

/// Initialize logging for tests (output captured per test)
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
