//! Shared runtime context captured at thread spawn time.

use std::sync::{Arc, Mutex};

use crate::audio::sink::SinkFactory;
use crate::playback::queue::QueueManager;
use crate::playback::state::{EventGate, SessionFlags, SharedEngine};
use crate::settings::PlayerSettings;

/// Captured shared state passed from `ModPlayer::spawn_session_thread` into
/// the session thread.
pub(in crate::playback::player::runtime) struct SessionContext {
    /// Settings snapshot taken when the session opened.
    pub(in crate::playback::player::runtime) settings: PlayerSettings,
    pub(in crate::playback::player::runtime) engine: Arc<SharedEngine>,
    pub(in crate::playback::player::runtime) queue: Arc<Mutex<Option<QueueManager>>>,
    pub(in crate::playback::player::runtime) flags: Arc<SessionFlags>,
    pub(in crate::playback::player::runtime) events: Arc<EventGate>,
    pub(in crate::playback::player::runtime) sink_factory: SinkFactory,
    pub(in crate::playback::player::runtime) current_file: Arc<Mutex<Option<String>>>,
}
