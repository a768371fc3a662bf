//! Liveness guard for session worker threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts a session thread as alive for as long as the guard exists.
///
/// The guard is created before the thread is spawned and moved into it, so
/// the count never dips to zero between `play` returning and the loop
/// starting. A session thread that is still tearing down while its
/// successor starts keeps its own count.
pub(in crate::playback::player::runtime) struct SessionThreadGuard {
    alive: Arc<AtomicUsize>,
}

impl SessionThreadGuard {
    pub(in crate::playback::player::runtime) fn new(alive: Arc<AtomicUsize>) -> Self {
        alive.fetch_add(1, Ordering::SeqCst);
        Self { alive }
    }
}

impl Drop for SessionThreadGuard {
    fn drop(&mut self) {
        self.alive.fetch_sub(1, Ordering::SeqCst);
    }
}
