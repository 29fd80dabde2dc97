//! Structured logging initialization.
//!
//! The RUST_LOG environment variable takes precedence over the level passed
//! in, so deployments can raise verbosity without a config change.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber for binaries and tests.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init(level: &str) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
