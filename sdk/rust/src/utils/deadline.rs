//! Bounded waits on blocking calls
//!
//! SDK processors flush synchronously and take no timeout. To share a single
//! deadline across several of them, each call runs on a short-lived thread
//! and the caller waits only for what remains of the deadline.

use std::time::{Duration, Instant};

/// Thread name for calls run by [`run_until`]
#[cfg(not(target_arch = "wasm32"))]
const WORKER_NAME: &str = "introspection-deadline";

/// Time left until `deadline`, `None` once it has passed
pub fn remaining(deadline: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|left| !left.is_zero())
}

/// Run `task` and return its result if it finishes before `deadline`.
///
/// On timeout the task keeps running in the background and its result is
/// discarded.
#[cfg(not(target_arch = "wasm32"))]
pub fn run_until<T, F>(deadline: Instant, task: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    use std::sync::mpsc;
    use std::thread;

    let left = remaining(deadline)?;
    let (tx, rx) = mpsc::sync_channel(1);
    let spawned = thread::Builder::new()
        .name(WORKER_NAME.to_string())
        .spawn(move || {
            // the receiver is gone once the caller timed out
            let _ = tx.send(task());
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "Failed to spawn deadline worker");
        return None;
    }
    rx.recv_timeout(left).ok()
}

/// Without threads the task runs inline; only a passed deadline is enforced.
#[cfg(target_arch = "wasm32")]
pub fn run_until<T, F>(deadline: Instant, task: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    remaining(deadline)?;
    Some(task())
}
