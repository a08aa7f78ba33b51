//! Graceful stop of a packing run via atomic flag

use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide stop flag, set by the SIGTERM/SIGINT handler
pub fn shutdown_flag() -> &'static AtomicBool {
    static FLAG: AtomicBool = AtomicBool::new(false);
    &FLAG
}

/// Whether the current run should stop after the entry in flight
pub fn is_shutdown_requested() -> bool {
    shutdown_flag().load(Ordering::Relaxed)
}
