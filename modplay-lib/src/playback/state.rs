//! Shared session state read by the loop thread and written by callers.
//!
//! Everything here is guarded by short critical sections; no lock is held
//! across a sink write or a sleep.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::engine::DecodeEngine;

use super::broadcast::EventBroadcaster;
use super::events::{EndReason, PlayerEvent};
use super::interrupt::TransportKey;

/// Lifecycle of the playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Loading,
    Playing,
    Paused,
    Stopping,
    Finished,
}

/// Outcome of a `play` request against the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionStart {
    /// No session was open; a loop thread must be spawned.
    Spawn,
    /// The running loop picks up the new queue.
    Retarget,
    /// A watchdog-killed session has not finished cleaning up.
    Refused,
}

#[derive(Debug)]
struct Flags {
    state: SessionState,
    open: bool,
    torn_down: bool,
    stop_requested: bool,
    skip_requested: bool,
    user_paused: bool,
    auto_paused: bool,
    return_to_prev: bool,
    restart_list: bool,
    looped: bool,
    pending_key: Option<TransportKey>,
    end_reason: Option<EndReason>,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            open: false,
            torn_down: false,
            stop_requested: false,
            skip_requested: false,
            user_paused: false,
            auto_paused: false,
            return_to_prev: false,
            restart_list: false,
            looped: false,
            pending_key: None,
            end_reason: None,
        }
    }
}

impl Flags {
    fn paused(&self) -> bool {
        self.user_paused || self.auto_paused
    }
}

/// Playback flags plus a condvar that wakes the paused loop.
#[derive(Debug, Default)]
pub(crate) struct SessionFlags {
    inner: Mutex<Flags>,
    changed: Condvar,
}

impl SessionFlags {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Flags> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<R>(&self, f: impl FnOnce(&mut Flags) -> R) -> R {
        let result = f(&mut self.lock());
        self.changed.notify_all();
        result
    }

    /// Open a session or retarget the running one.
    ///
    /// Must be called with the queue lock held so the loop's end-of-session
    /// decision cannot interleave.
    pub(crate) fn begin_session(&self) -> SessionStart {
        self.update(|flags| {
            if flags.open && flags.torn_down {
                return SessionStart::Refused;
            }
            flags.stop_requested = false;
            flags.return_to_prev = false;
            flags.user_paused = false;
            flags.pending_key = None;
            if flags.open {
                flags.restart_list = true;
                flags.skip_requested = true;
                flags.end_reason = None;
                SessionStart::Retarget
            } else {
                flags.open = true;
                flags.torn_down = false;
                flags.restart_list = false;
                flags.skip_requested = false;
                flags.end_reason = None;
                flags.state = SessionState::Loading;
                SessionStart::Spawn
            }
        })
    }

    /// Mark the session closed. Called by the loop under the queue lock.
    pub(crate) fn close_session(&self) -> EndReason {
        self.update(|flags| {
            flags.open = false;
            flags.state = SessionState::Finished;
            flags.skip_requested = false;
            flags.user_paused = false;
            flags.pending_key = None;
            *flags.end_reason.get_or_insert(EndReason::QueueExhausted)
        })
    }

    pub(crate) fn is_open(&self) -> bool {
        self.lock().open
    }

    pub(crate) fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Record loop progress; ignored once a stop is pending.
    pub(crate) fn set_state(&self, state: SessionState) {
        self.update(|flags| {
            if !flags.stop_requested || state == SessionState::Finished {
                flags.state = state;
            }
        });
    }

    /// Cooperative stop, honoured at the next loop boundary.
    pub(crate) fn request_stop(&self, reason: EndReason) {
        self.update(|flags| {
            if !flags.open {
                return;
            }
            flags.stop_requested = true;
            flags.skip_requested = true;
            flags.user_paused = false;
            flags.end_reason.get_or_insert(reason);
            flags.state = SessionState::Stopping;
        });
    }

    /// Forced stop from the watchdog. Returns `false` if no session was open.
    pub(crate) fn tear_down(&self) -> bool {
        self.update(|flags| {
            if !flags.open {
                return false;
            }
            flags.torn_down = true;
            flags.stop_requested = true;
            flags.skip_requested = true;
            flags.user_paused = false;
            flags.end_reason = Some(EndReason::Watchdog);
            flags.state = SessionState::Stopping;
            true
        })
    }

    pub(crate) fn is_torn_down(&self) -> bool {
        self.lock().torn_down
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.lock().stop_requested
    }

    /// End the current track and move on. An interruption pause carries
    /// over to the next track.
    pub(crate) fn skip_track(&self) {
        self.update(|flags| {
            flags.skip_requested = true;
            flags.user_paused = false;
        });
    }

    /// End the current track and move back one.
    pub(crate) fn previous_track(&self) {
        self.update(|flags| {
            flags.skip_requested = true;
            flags.return_to_prev = true;
            flags.user_paused = false;
        });
    }

    /// Consume a pending skip request.
    pub(crate) fn take_skip(&self) -> bool {
        std::mem::take(&mut self.lock().skip_requested)
    }

    pub(crate) fn return_to_prev(&self) -> bool {
        self.lock().return_to_prev
    }

    pub(crate) fn clear_return_to_prev(&self) {
        self.lock().return_to_prev = false;
    }

    pub(crate) fn take_restart(&self) -> bool {
        std::mem::take(&mut self.lock().restart_list)
    }

    pub(crate) fn looped(&self) -> bool {
        self.lock().looped
    }

    pub(crate) fn toggle_loop(&self) -> bool {
        self.update(|flags| {
            flags.looped = !flags.looped;
            flags.looped
        })
    }

    /// User play/pause toggle.
    pub(crate) fn toggle_pause(&self) {
        self.update(|flags| flags.user_paused = !flags.user_paused);
    }

    /// Explicit user resume. Playback stays held while a call is active.
    pub(crate) fn resume(&self) {
        self.update(|flags| flags.user_paused = false);
    }

    /// Interruption pause on or off.
    ///
    /// Turning it off only clears the interruption's own pause; a user pause
    /// survives. Returns whether an interruption pause is active afterwards.
    pub(crate) fn auto_pause(&self, pause: bool) -> bool {
        self.update(|flags| {
            flags.auto_paused = pause;
            flags.auto_paused
        })
    }

    pub(crate) fn auto_pause_active(&self) -> bool {
        self.lock().auto_paused
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.lock().paused()
    }

    /// Block while paused, waking at least every `poll`.
    ///
    /// Returns `true` if still paused after the wait and no skip is pending.
    pub(crate) fn wait_while_paused(&self, poll: Duration) -> bool {
        let flags = self.lock();
        if !flags.paused() || flags.skip_requested {
            return false;
        }
        let (flags, _) = self
            .changed
            .wait_timeout(flags, poll)
            .unwrap_or_else(PoisonError::into_inner);
        flags.paused() && !flags.skip_requested
    }

    /// Post a transport key for the loop thread. Ignored without a session.
    pub(crate) fn post_key(&self, key: TransportKey) -> bool {
        self.update(|flags| {
            if !flags.open || flags.torn_down {
                return false;
            }
            flags.pending_key = Some(key);
            true
        })
    }

    pub(crate) fn take_pending_key(&self) -> Option<TransportKey> {
        self.lock().pending_key.take()
    }
}

/// Engine plus the flag that gates telemetry reads.
pub(crate) struct EngineSlot {
    pub(crate) engine: Box<dyn DecodeEngine>,
    pub(crate) live: bool,
}

/// The decode engine shared between the loop and telemetry readers.
pub(crate) struct SharedEngine {
    slot: Mutex<EngineSlot>,
}

impl SharedEngine {
    pub(crate) fn new(engine: Box<dyn DecodeEngine>) -> Self {
        Self {
            slot: Mutex::new(EngineSlot {
                engine,
                live: false,
            }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, EngineSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` only while a module is playing.
    pub(crate) fn with_live<R>(&self, f: impl FnOnce(&mut dyn DecodeEngine) -> R) -> Option<R> {
        let mut slot = self.lock();
        if !slot.live {
            return None;
        }
        Some(f(slot.engine.as_mut()))
    }

    pub(crate) fn set_live(&self, live: bool) {
        self.lock().live = live;
    }

    /// Best-effort telemetry shutdown that never waits on a busy engine.
    pub(crate) fn try_mark_dead(&self) -> bool {
        match self.slot.try_lock() {
            Ok(mut slot) => {
                slot.live = false;
                true
            }
            Err(std::sync::TryLockError::Poisoned(poisoned)) => {
                poisoned.into_inner().live = false;
                true
            }
            Err(std::sync::TryLockError::WouldBlock) => false,
        }
    }
}

/// Broadcaster wrapper that stops delivering once the session has ended.
pub(crate) struct EventGate {
    broadcaster: EventBroadcaster,
    closed: Mutex<bool>,
}

impl EventGate {
    pub(crate) fn new() -> Self {
        Self {
            broadcaster: EventBroadcaster::new(),
            closed: Mutex::new(true),
        }
    }

    pub(crate) fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    pub(crate) fn open(&self) {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    /// Deliver `event` unless the session already ended.
    ///
    /// A `SessionEnded` event closes the gate. Returns whether it was sent.
    pub(crate) fn emit(&self, event: PlayerEvent) -> bool {
        {
            let mut closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
            if *closed {
                return false;
            }
            if matches!(event, PlayerEvent::SessionEnded { .. }) {
                *closed = true;
            }
        }
        // Delivered unlocked: a subscriber may start a new session from here.
        self.broadcaster.broadcast(&event);
        true
    }
}
