//! Signal handling for graceful shutdown of server binaries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Install a SIGINT/SIGTERM handler.
///
/// Returns a flag that flips to `true` on the first signal. A second
/// signal exits the process immediately.
pub fn install_signal_handler() -> Arc<AtomicBool> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();

    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            tracing::warn!("received second signal, forcing immediate exit");
            std::process::exit(1);
        }
        tracing::info!("received shutdown signal, quitting");
    })
    .expect("failed to set signal handler");

    shutdown
}
