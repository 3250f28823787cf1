use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide shutdown flag, set from the SIGINT/SIGTERM handler and
/// polled at the top of `Multiplexer::run`'s loop. A signal handler can
/// only safely touch async-signal-safe state, so this is the one piece of
/// global mutable state the core allows.
pub static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Requests an orderly shutdown. Safe to call from a signal handler.
pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}
