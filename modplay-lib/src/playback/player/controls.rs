//! Transport and lifecycle operations for `ModPlayer`.
//!
//! Every method here is fire-and-forget: requests are recorded in shared
//! session state and picked up by the session thread at its next loop
//! boundary. Nothing returns an error to the caller.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::diagnostics::reporter::{Report, Reporter};
use crate::playback::broadcast::SubscriberHandle;
use crate::playback::events::EndReason;
use crate::playback::interrupt::InterruptCoordinator;
use crate::playback::queue::QueueManager;
use crate::playback::state::SessionStart;
use crate::settings::PlayerSettings;

use super::{ModPlayer, SessionState};

const FINISH_POLL_MS: u64 = 10;

impl ModPlayer {
    /// Play `tracks` starting at `start_index`.
    ///
    /// While a session is running the queue is replaced and the running loop
    /// restarts on it; otherwise a new session thread is started. An empty
    /// list is ignored.
    pub fn play(&self, tracks: Vec<String>, start_index: usize, shuffle: bool, loop_list: bool) {
        let queue = match QueueManager::new(tracks, start_index, shuffle, loop_list) {
            Ok(queue) => queue,
            Err(err) => {
                warn!("play ignored: {}", err);
                return;
            }
        };
        let size = queue.size();

        let start = {
            let mut slot = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            let start = self.flags.begin_session();
            if start != SessionStart::Refused {
                *slot = Some(queue);
            }
            start
        };

        match start {
            SessionStart::Spawn => {
                info!("starting session with {} track(s)", size);
                self.spawn_session_thread();
            }
            SessionStart::Retarget => {
                info!("replacing queue of running session ({} track(s))", size);
            }
            SessionStart::Refused => {
                warn!("play ignored: previous session is still shutting down after a watchdog stop");
            }
        }
    }

    /// Append tracks to the current queue without interrupting playback.
    pub fn add(&self, tracks: Vec<String>) {
        let mut slot = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_mut() {
            Some(queue) => {
                let count = tracks.len();
                queue.add(tracks);
                info!("added {} track(s) to play queue", count);
            }
            None => warn!("add ignored: no play queue"),
        }
    }

    /// Stop the session at the next loop boundary.
    pub fn stop(&self) {
        debug!("stop requested");
        self.flags.request_stop(EndReason::Stopped);
    }

    /// Toggle the user pause.
    pub fn pause(&self) {
        self.flags.toggle_pause();
    }

    /// Clear the user pause. A pause held by an active call stays until the
    /// call ends.
    pub fn resume(&self) {
        self.flags.resume();
    }

    /// Seek within the current track. Ignored when nothing is playing.
    pub fn seek(&self, seconds: u32) {
        self.engine
            .with_live(|engine| engine.seek(seconds.saturating_mul(1000)));
    }

    /// End the current track and move to the next one.
    pub fn next_song(&self) {
        if self.flags.is_open() {
            self.flags.skip_track();
        }
    }

    /// End the current track and move to the previous one.
    pub fn prev_song(&self) {
        if self.flags.is_open() {
            self.flags.previous_track();
        }
    }

    /// Toggle repeating the current module; returns the new state.
    pub fn toggle_loop(&self) -> bool {
        self.flags.toggle_loop()
    }

    pub fn is_looped(&self) -> bool {
        self.flags.looped()
    }

    /// Mute or unmute a mixer channel; returns the previous mute state.
    pub fn mute(&self, channel: usize, muted: bool) -> bool {
        self.engine
            .with_live(|engine| engine.mute(channel, muted))
            .unwrap_or(false)
    }

    pub fn is_paused(&self) -> bool {
        self.flags.is_paused()
    }

    /// Playback position of the current track in milliseconds.
    pub fn time(&self) -> u64 {
        self.engine
            .with_live(|engine| u64::from(engine.elapsed_ms()))
            .unwrap_or(0)
    }

    pub fn state(&self) -> SessionState {
        self.flags.state()
    }

    /// Return true while a session thread exists.
    pub fn is_alive(&self) -> bool {
        self.session_threads.load(Ordering::SeqCst) > 0
    }

    /// Path of the track being loaded or played.
    pub fn current_file(&self) -> Option<String> {
        self.current_file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current queue contents and cursor.
    pub fn queue_snapshot(&self) -> Option<(Vec<String>, usize)> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|queue| (queue.tracks().to_vec(), queue.index()))
    }

    /// Subscribe to playback events. Returns `false` if already registered.
    pub fn register_callback(&self, subscriber: SubscriberHandle) -> bool {
        self.events.broadcaster().register(subscriber)
    }

    /// Returns `false` if the subscriber was not registered.
    pub fn unregister_callback(&self, subscriber: &SubscriberHandle) -> bool {
        self.events.broadcaster().unregister(subscriber)
    }

    /// Handle for telephony and media-key producers.
    pub fn interrupts(&self) -> InterruptCoordinator {
        InterruptCoordinator::new(self.flags.clone())
    }

    pub fn settings(&self) -> PlayerSettings {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the settings used by the next session.
    pub fn set_settings(&self, settings: PlayerSettings) {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    /// Block until no session thread is alive or `timeout` passes.
    ///
    /// Returns `true` if the session finished.
    pub fn wait_until_finished(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_alive() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(FINISH_POLL_MS));
        }
        true
    }

    /// Start periodic telemetry reports.
    ///
    /// Any previous reporter instance is stopped before a new one is started.
    pub fn set_reporting(&self, report: Arc<Mutex<dyn Fn(Report) + Send>>, interval: Duration) {
        let mut slot = self.reporter.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            previous.stop();
        }

        let engine = self.engine.clone();
        let flags = self.flags.clone();
        let current_file = self.current_file.clone();
        let source = Arc::new(move || Report {
            time_ms: engine
                .with_live(|engine| u64::from(engine.elapsed_ms()))
                .unwrap_or(0),
            info: engine
                .with_live(|engine| engine.frame_info())
                .unwrap_or_default(),
            paused: flags.is_paused(),
            state: flags.state(),
            file: current_file
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        });

        let reporter = Reporter::new(source, report, interval);
        reporter.start();
        *slot = Some(reporter);
    }

    /// Stop periodic telemetry reports.
    pub fn stop_reporting(&self) {
        if let Some(reporter) = self
            .reporter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            reporter.stop();
        }
    }
}
