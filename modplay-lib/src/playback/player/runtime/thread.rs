//! Session-thread bootstrap for `ModPlayer`.
//!
//! This module snapshots settings, captures shared state, and spawns the
//! worker loop that drives the engine and the sink.

use std::sync::PoisonError;
use std::thread;

use log::{error, warn};

use crate::playback::events::{EndReason, PlayerEvent};

use super::super::{ModPlayer, SESSION_THREAD_NAME};
use super::worker::{run_session, SessionContext, SessionThreadGuard};

impl ModPlayer {
    /// Spawn the loop thread for a session opened by `play`.
    ///
    /// The previous session thread, if any, is joined first so its final
    /// event is delivered before the new session's first one.
    pub(in crate::playback::player) fn spawn_session_thread(&self) {
        self.join_session_thread();
        self.events.open();

        let context = SessionContext {
            settings: self
                .settings
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            engine: self.engine.clone(),
            queue: self.queue.clone(),
            flags: self.flags.clone(),
            events: self.events.clone(),
            sink_factory: self.sink_factory.clone(),
            current_file: self.current_file.clone(),
        };

        let guard = SessionThreadGuard::new(self.session_threads.clone());
        let spawned = thread::Builder::new()
            .name(SESSION_THREAD_NAME.to_string())
            .spawn(move || {
                let _guard = guard;
                run_session(context);
            });

        match spawned {
            Ok(handle) => {
                *self
                    .session_thread_handle
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(handle);
            }
            Err(err) => {
                error!("failed to spawn session thread: {}", err);
                let reason = {
                    let _queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
                    self.flags.request_stop(EndReason::Stopped);
                    self.flags.close_session()
                };
                self.events.emit(PlayerEvent::SessionEnded { reason });
            }
        }
    }

    /// Wait for the last session thread to exit.
    ///
    /// Skipped when called from the session thread itself, which happens
    /// when a subscriber starts a new session from its `SessionEnded`
    /// callback.
    pub(in crate::playback::player) fn join_session_thread(&self) {
        let handle = self
            .session_thread_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("session thread panicked during join");
            }
        }
    }
}
