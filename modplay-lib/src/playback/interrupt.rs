//! Translation of external signals into playback commands.
//!
//! Hardware transport keys and telephony call-state changes arrive on
//! arbitrary threads. Keys are parked in a single pending slot that the
//! session loop drains once per frame; call states flip the interruption
//! pause directly.

use std::sync::Arc;

use log::{debug, info};

use super::state::SessionFlags;

/// Hardware media/transport key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKey {
    Next,
    Previous,
    Stop,
    PlayPause,
}

/// Telephony state reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Ringing,
    OffHook,
}

impl CallState {
    fn interrupts_playback(self) -> bool {
        !matches!(self, CallState::Idle)
    }
}

/// Played time after which Previous restarts the track instead of leaving it.
pub const PREVIOUS_RESTART_THRESHOLD_MS: u64 = 2000;

/// Entry point for out-of-band command producers.
#[derive(Clone)]
pub struct InterruptCoordinator {
    flags: Arc<SessionFlags>,
}

impl InterruptCoordinator {
    pub(crate) fn new(flags: Arc<SessionFlags>) -> Self {
        Self { flags }
    }

    /// Queue a transport key for the session loop.
    ///
    /// Returns `false` (and does nothing) when no session is active. A key
    /// posted before the previous one was consumed replaces it.
    pub fn press(&self, key: TransportKey) -> bool {
        let accepted = self.flags.post_key(key);
        if accepted {
            debug!("transport key {:?} queued", key);
        } else {
            debug!("transport key {:?} ignored: no session", key);
        }
        accepted
    }

    /// Apply a call-state change.
    ///
    /// Ringing or off-hook pauses playback; idle lifts only that pause.
    pub fn call_state(&self, state: CallState) {
        let interrupted = state.interrupts_playback();
        self.flags.auto_pause(interrupted);
        if interrupted {
            info!("call state {:?}: pausing playback", state);
        } else {
            info!("call ended: lifting interruption pause");
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.flags.auto_pause_active()
    }
}

/// What the session loop should do for a key it drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyAction {
    Skip,
    Rewind,
    Previous,
    Stop,
    TogglePause,
}

/// Resolve a key against the current track position.
pub(crate) fn resolve_key(key: TransportKey, elapsed_ms: u64) -> KeyAction {
    match key {
        TransportKey::Next => KeyAction::Skip,
        TransportKey::Previous if elapsed_ms > PREVIOUS_RESTART_THRESHOLD_MS => KeyAction::Rewind,
        TransportKey::Previous => KeyAction::Previous,
        TransportKey::Stop => KeyAction::Stop,
        TransportKey::PlayPause => KeyAction::TogglePause,
    }
}
