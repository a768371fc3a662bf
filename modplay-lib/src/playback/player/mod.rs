//! High-level playback controller.

mod controls;
mod runtime;
mod telemetry;
#[cfg(test)]
mod tests;

use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::audio::sink::{default_sink_factory, SinkFactory};
use crate::diagnostics::reporter::Reporter;
use crate::engine::DecodeEngine;
use crate::settings::PlayerSettings;

use super::queue::QueueManager;
use super::state::{EventGate, SessionFlags, SharedEngine};

pub use super::state::SessionState;

/// Name given to the thread running the decode loop.
const SESSION_THREAD_NAME: &str = "modplay-session";

/// Primary playback controller.
///
/// `ModPlayer` owns the decode engine, the play queue and the session thread.
/// Clones share the same session; every control method is safe to call from
/// any thread and never returns an error.
#[derive(Clone)]
pub struct ModPlayer {
    settings: Arc<Mutex<PlayerSettings>>,
    engine: Arc<SharedEngine>,
    queue: Arc<Mutex<Option<QueueManager>>>,
    flags: Arc<SessionFlags>,
    events: Arc<EventGate>,
    sink_factory: SinkFactory,
    current_file: Arc<Mutex<Option<String>>>,
    session_threads: Arc<AtomicUsize>,
    session_thread_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    reporter: Arc<Mutex<Option<Reporter>>>,
}

impl ModPlayer {
    /// Create a player rendering to the default audio device.
    pub fn new(engine: Box<dyn DecodeEngine>, settings: PlayerSettings) -> Self {
        Self::with_sink_factory(engine, settings, default_sink_factory())
    }

    /// Create a player with a custom output, e.g. a null sink for headless use.
    pub fn with_sink_factory(
        engine: Box<dyn DecodeEngine>,
        settings: PlayerSettings,
        sink_factory: SinkFactory,
    ) -> Self {
        Self {
            settings: Arc::new(Mutex::new(settings)),
            engine: Arc::new(SharedEngine::new(engine)),
            queue: Arc::new(Mutex::new(None)),
            flags: Arc::new(SessionFlags::new()),
            events: Arc::new(EventGate::new()),
            sink_factory,
            current_file: Arc::new(Mutex::new(None)),
            session_threads: Arc::new(AtomicUsize::new(0)),
            session_thread_handle: Arc::new(Mutex::new(None)),
            reporter: Arc::new(Mutex::new(None)),
        }
    }
}
