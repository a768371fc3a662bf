use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::buffer::FrameBatch;
use crate::audio::sink::{null_sink_factory, AudioSink, SinkFactory, SinkSpec};
use crate::engine::{DecodeEngine, FrameInfo, MixerParameter};
use crate::error::{EngineError, SinkError};
use crate::playback::broadcast::ChannelSubscriber;
use crate::playback::events::{EndReason, PlayerEvent};
use crate::playback::interrupt::{CallState, TransportKey};
use crate::settings::PlayerSettings;

use super::{ModPlayer, SessionState};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone, Default)]
struct Script {
    /// Frames per pass through the module before the loop counter bumps.
    frames: u32,
    reject: bool,
    fail_load: bool,
    /// Block inside `decode_frame` on this frame number.
    stall: Option<(u32, Duration)>,
}

fn track(frames: u32) -> Script {
    Script {
        frames,
        ..Script::default()
    }
}

#[derive(Default)]
struct Counters {
    decoded: AtomicUsize,
    seeks: AtomicUsize,
    loads: AtomicUsize,
}

struct ScriptedEngine {
    scripts: HashMap<String, Script>,
    loaded: Option<(String, Script)>,
    frame: u32,
    loops: u32,
    elapsed_ms: u32,
    frame_ms: u32,
    counters: Arc<Counters>,
}

impl ScriptedEngine {
    fn new(scripts: &[(&str, Script)], counters: Arc<Counters>) -> Self {
        Self {
            scripts: scripts
                .iter()
                .map(|(name, script)| (name.to_string(), script.clone()))
                .collect(),
            loaded: None,
            frame: 0,
            loops: 0,
            elapsed_ms: 0,
            frame_ms: 20,
            counters,
        }
    }
}

impl DecodeEngine for ScriptedEngine {
    fn accepts(&self, path: &str) -> bool {
        self.scripts
            .get(path)
            .map(|script| !script.reject)
            .unwrap_or(false)
    }

    fn load(&mut self, path: &str) -> Result<(), EngineError> {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.get(path).cloned().ok_or(EngineError::NotLoaded)?;
        if script.fail_load {
            return Err(EngineError::Load {
                path: path.to_string(),
                reason: "corrupt".to_string(),
            });
        }
        self.loaded = Some((path.to_string(), script));
        Ok(())
    }

    fn release(&mut self) {
        self.loaded = None;
    }

    fn start(&mut self, _sample_rate: u32, _channels: u16) -> Result<(), EngineError> {
        self.frame = 0;
        self.loops = 0;
        self.elapsed_ms = 0;
        Ok(())
    }

    fn end(&mut self) {}

    fn decode_frame(&mut self) -> Result<(), EngineError> {
        let (_, script) = self.loaded.as_ref().ok_or(EngineError::NotLoaded)?;
        if let Some((frame, delay)) = script.stall {
            if self.frame == frame && self.loops == 0 {
                thread::sleep(delay);
            }
        }
        if self.frame >= script.frames {
            self.frame = 0;
            self.loops += 1;
        }
        self.frame += 1;
        self.elapsed_ms += self.frame_ms;
        self.counters.decoded.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(1));
        Ok(())
    }

    fn fill_buffer(&mut self, batch: &mut FrameBatch) -> usize {
        batch.set_filled_bytes(64);
        batch.byte_len()
    }

    fn loop_count(&self) -> u32 {
        self.loops
    }

    fn seek(&mut self, ms: u32) {
        self.counters.seeks.fetch_add(1, Ordering::SeqCst);
        self.elapsed_ms = ms;
    }

    fn elapsed_ms(&self) -> u32 {
        self.elapsed_ms
    }

    fn set_mixer(&mut self, _parameter: MixerParameter) {}

    fn mute(&mut self, _channel: usize, _muted: bool) -> bool {
        false
    }

    fn module_name(&self) -> String {
        self.loaded
            .as_ref()
            .map(|(name, _)| name.clone())
            .unwrap_or_default()
    }

    fn instruments(&self) -> Vec<String> {
        vec!["lead".to_string()]
    }

    fn frame_info(&self) -> FrameInfo {
        FrameInfo {
            frame: self.frame,
            ..FrameInfo::default()
        }
    }
}

fn test_settings() -> PlayerSettings {
    PlayerSettings {
        sample_rate: 8000,
        buffer_ms: 10,
        watchdog_timeout_ms: 2000,
        pause_poll_ms: 10,
        ..PlayerSettings::default()
    }
}

struct Harness {
    player: ModPlayer,
    events: Receiver<PlayerEvent>,
    counters: Arc<Counters>,
}

impl Harness {
    fn new(scripts: &[(&str, Script)]) -> Self {
        Self::with_settings(scripts, test_settings(), null_sink_factory(false))
    }

    fn with_settings(
        scripts: &[(&str, Script)],
        settings: PlayerSettings,
        sink_factory: SinkFactory,
    ) -> Self {
        let counters = Arc::new(Counters::default());
        let engine = ScriptedEngine::new(scripts, counters.clone());
        let player = ModPlayer::with_sink_factory(Box::new(engine), settings, sink_factory);
        let (tx, rx) = mpsc::channel();
        player.register_callback(Arc::new(ChannelSubscriber::new(tx)));
        Self {
            player,
            events: rx,
            counters,
        }
    }

    fn play(&self, tracks: &[&str], start: usize, loop_list: bool) {
        self.player.play(names(tracks), start, false, loop_list);
    }

    fn next_event(&self) -> PlayerEvent {
        self.events
            .recv_timeout(WAIT)
            .expect("timed out waiting for a player event")
    }

    /// Collect events up to and including `SessionEnded`.
    fn until_session_end(&self) -> Vec<PlayerEvent> {
        let mut seen = Vec::new();
        loop {
            let event = self.next_event();
            let done = matches!(event, PlayerEvent::SessionEnded { .. });
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    fn wait_state(&self, state: SessionState) {
        assert!(
            wait_for(|| self.player.state() == state),
            "state never became {:?}, still {:?}",
            state,
            self.player.state()
        );
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|name| name.to_string()).collect()
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

fn started(name: &str) -> PlayerEvent {
    PlayerEvent::TrackStarted {
        name: name.to_string(),
        instruments: vec!["lead".to_string()],
    }
}

fn ended(name: &str) -> PlayerEvent {
    PlayerEvent::TrackEnded {
        name: name.to_string(),
    }
}

fn session_ended(reason: EndReason) -> PlayerEvent {
    PlayerEvent::SessionEnded { reason }
}

#[test]
fn failing_track_is_skipped() {
    let harness = Harness::new(&[
        (
            "a",
            Script {
                fail_load: true,
                ..track(5)
            },
        ),
        ("b", track(5)),
        ("c", track(5)),
    ]);
    harness.play(&["a", "b", "c"], 0, false);

    assert_eq!(
        harness.until_session_end(),
        vec![
            started("b"),
            ended("b"),
            started("c"),
            ended("c"),
            session_ended(EndReason::QueueExhausted),
        ]
    );
    assert!(harness.player.wait_until_finished(WAIT));
    assert_eq!(harness.player.state(), SessionState::Finished);
}

#[test]
fn rejected_format_is_skipped_without_loading() {
    let harness = Harness::new(&[
        (
            "a",
            Script {
                reject: true,
                ..track(5)
            },
        ),
        ("b", track(5)),
    ]);
    harness.play(&["a", "b"], 0, false);

    assert_eq!(
        harness.until_session_end(),
        vec![
            started("b"),
            ended("b"),
            session_ended(EndReason::QueueExhausted)
        ]
    );
    assert_eq!(harness.counters.loads.load(Ordering::SeqCst), 1);
}

#[test]
fn single_track_loop_list_replays_until_stop() {
    let harness = Harness::new(&[("a", track(3))]);
    harness.play(&["a"], 0, true);

    for _ in 0..3 {
        assert_eq!(harness.next_event(), started("a"));
        assert_eq!(harness.next_event(), ended("a"));
    }
    harness.player.stop();

    let rest = harness.until_session_end();
    assert_eq!(rest.last(), Some(&session_ended(EndReason::Stopped)));
    let starts = rest
        .iter()
        .filter(|event| matches!(event, PlayerEvent::TrackStarted { .. }))
        .count();
    let ends = rest
        .iter()
        .filter(|event| matches!(event, PlayerEvent::TrackEnded { .. }))
        .count();
    assert_eq!(starts, ends);
}

#[test]
fn every_track_failing_ends_looping_session() {
    let broken = Script {
        fail_load: true,
        ..track(5)
    };
    let harness = Harness::new(&[("a", broken.clone()), ("b", broken)]);
    harness.play(&["a", "b"], 0, true);

    assert_eq!(
        harness.until_session_end(),
        vec![session_ended(EndReason::QueueExhausted)]
    );
}

#[test]
fn module_loop_ends_track_unless_looping() {
    let harness = Harness::new(&[("a", track(3))]);
    assert!(harness.player.toggle_loop());
    harness.play(&["a"], 0, false);

    assert_eq!(harness.next_event(), started("a"));
    harness.wait_state(SessionState::Playing);
    assert!(wait_for(|| harness.counters.decoded.load(Ordering::SeqCst) > 20));
    assert!(harness.events.try_recv().is_err());

    assert!(!harness.player.toggle_loop());
    assert_eq!(
        harness.until_session_end(),
        vec![ended("a"), session_ended(EndReason::QueueExhausted)]
    );
}

#[test]
fn call_interruption_pauses_and_resumes() {
    let harness = Harness::new(&[("a", track(100_000))]);
    let interrupts = harness.player.interrupts();
    harness.play(&["a"], 0, false);
    harness.wait_state(SessionState::Playing);

    interrupts.call_state(CallState::Ringing);
    harness.wait_state(SessionState::Paused);
    let decoded = harness.counters.decoded.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(60));
    assert_eq!(harness.counters.decoded.load(Ordering::SeqCst), decoded);

    interrupts.call_state(CallState::Idle);
    harness.wait_state(SessionState::Playing);
    assert!(!harness.player.is_paused());

    harness.player.stop();
    harness.until_session_end();
}

#[test]
fn user_pause_survives_call_end() {
    let harness = Harness::new(&[("a", track(100_000))]);
    let interrupts = harness.player.interrupts();
    harness.play(&["a"], 0, false);
    harness.wait_state(SessionState::Playing);

    harness.player.pause();
    harness.wait_state(SessionState::Paused);
    interrupts.call_state(CallState::OffHook);
    interrupts.call_state(CallState::Idle);
    thread::sleep(Duration::from_millis(60));
    assert!(harness.player.is_paused());
    assert_eq!(harness.player.state(), SessionState::Paused);

    harness.player.resume();
    harness.wait_state(SessionState::Playing);
    harness.player.stop();
    assert_eq!(
        harness.until_session_end().last(),
        Some(&session_ended(EndReason::Stopped))
    );
}

/// Asserts the session sits paused by the call without decoding.
fn assert_held_by_call(harness: &Harness) {
    harness.wait_state(SessionState::Paused);
    assert!(harness.player.is_paused());
    assert!(harness.player.interrupts().is_interrupted());
    let decoded = harness.counters.decoded.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(60));
    assert_eq!(harness.counters.decoded.load(Ordering::SeqCst), decoded);
}

#[test]
fn skipping_during_call_keeps_session_paused() {
    let harness = Harness::new(&[("a", track(100_000)), ("b", track(100_000))]);
    let interrupts = harness.player.interrupts();
    harness.play(&["a", "b"], 0, false);
    assert_eq!(harness.next_event(), started("a"));
    harness.wait_state(SessionState::Playing);

    interrupts.call_state(CallState::Ringing);
    harness.wait_state(SessionState::Paused);
    harness.player.next_song();
    assert_eq!(harness.next_event(), ended("a"));
    assert_eq!(harness.next_event(), started("b"));
    assert_held_by_call(&harness);

    let held = harness.counters.decoded.load(Ordering::SeqCst);
    interrupts.call_state(CallState::Idle);
    harness.wait_state(SessionState::Playing);
    assert!(wait_for(|| harness.counters.decoded.load(Ordering::SeqCst) > held));

    harness.player.stop();
    assert_eq!(
        harness.until_session_end(),
        vec![ended("b"), session_ended(EndReason::Stopped)]
    );
}

#[test]
fn resume_during_call_keeps_session_paused() {
    let harness = Harness::new(&[("a", track(100_000))]);
    let interrupts = harness.player.interrupts();
    harness.play(&["a"], 0, false);
    harness.wait_state(SessionState::Playing);

    interrupts.call_state(CallState::OffHook);
    harness.player.pause();
    harness.player.resume();
    assert_held_by_call(&harness);

    interrupts.call_state(CallState::Idle);
    harness.wait_state(SessionState::Playing);
    assert!(!harness.player.is_paused());

    harness.player.stop();
    harness.until_session_end();
}

#[test]
fn play_during_call_starts_new_queue_paused() {
    let harness = Harness::new(&[("a", track(100_000)), ("x", track(100_000))]);
    let interrupts = harness.player.interrupts();
    harness.play(&["a"], 0, false);
    assert_eq!(harness.next_event(), started("a"));
    harness.wait_state(SessionState::Playing);

    interrupts.call_state(CallState::Ringing);
    harness.wait_state(SessionState::Paused);
    harness.play(&["x"], 0, false);
    assert_eq!(harness.next_event(), ended("a"));
    assert_eq!(harness.next_event(), started("x"));
    assert_held_by_call(&harness);

    // Stop works while the call still holds playback.
    harness.player.stop();
    assert_eq!(
        harness.until_session_end(),
        vec![ended("x"), session_ended(EndReason::Stopped)]
    );
    assert!(interrupts.is_interrupted());
    interrupts.call_state(CallState::Idle);
}

#[test]
fn stop_while_paused_ends_session() {
    let harness = Harness::new(&[("a", track(100_000)), ("b", track(5))]);
    harness.play(&["a", "b"], 0, false);
    harness.wait_state(SessionState::Playing);
    harness.player.pause();
    harness.wait_state(SessionState::Paused);

    harness.player.stop();
    assert_eq!(
        harness.until_session_end(),
        vec![
            started("a"),
            ended("a"),
            session_ended(EndReason::Stopped)
        ]
    );
}

#[test]
fn next_and_previous_navigate_queue() {
    let harness = Harness::new(&[
        ("a", track(100_000)),
        ("b", track(100_000)),
        ("c", track(100_000)),
    ]);
    harness.play(&["a", "b", "c"], 1, false);
    assert_eq!(harness.next_event(), started("b"));

    harness.player.next_song();
    assert_eq!(harness.next_event(), ended("b"));
    assert_eq!(harness.next_event(), started("c"));

    harness.player.prev_song();
    assert_eq!(harness.next_event(), ended("c"));
    assert_eq!(harness.next_event(), started("b"));

    harness.player.stop();
    assert_eq!(
        harness.until_session_end(),
        vec![ended("b"), session_ended(EndReason::Stopped)]
    );
}

#[test]
fn previous_on_first_track_replays_it() {
    let harness = Harness::new(&[("a", track(100_000)), ("b", track(100_000))]);
    harness.play(&["a", "b"], 0, false);
    assert_eq!(harness.next_event(), started("a"));

    harness.player.prev_song();
    assert_eq!(harness.next_event(), ended("a"));
    assert_eq!(harness.next_event(), started("a"));

    harness.player.stop();
    harness.until_session_end();
}

#[test]
fn play_while_running_retargets_session() {
    let harness = Harness::new(&[
        ("a", track(100_000)),
        ("x", track(100_000)),
        ("y", track(100_000)),
    ]);
    harness.play(&["a"], 0, false);
    assert_eq!(harness.next_event(), started("a"));

    harness.play(&["x", "y"], 1, false);
    assert_eq!(harness.next_event(), ended("a"));
    assert_eq!(harness.next_event(), started("y"));
    assert_eq!(harness.player.current_file().as_deref(), Some("y"));

    harness.player.stop();
    assert_eq!(
        harness.until_session_end(),
        vec![ended("y"), session_ended(EndReason::Stopped)]
    );
    assert!(harness.player.wait_until_finished(WAIT));
    assert!(harness
        .events
        .recv_timeout(Duration::from_millis(50))
        .is_err());
}

#[test]
fn add_extends_running_queue() {
    let harness = Harness::new(&[("a", track(100_000)), ("b", track(5))]);
    harness.play(&["a"], 0, false);
    assert_eq!(harness.next_event(), started("a"));

    harness.player.add(names(&["b"]));
    assert_eq!(
        harness.player.queue_snapshot(),
        Some((names(&["a", "b"]), 0))
    );
    harness.player.next_song();

    assert_eq!(
        harness.until_session_end(),
        vec![
            ended("a"),
            started("b"),
            ended("b"),
            session_ended(EndReason::QueueExhausted)
        ]
    );
}

#[test]
fn new_session_starts_after_previous_finished() {
    let harness = Harness::new(&[("a", track(5))]);
    harness.play(&["a"], 0, false);
    harness.until_session_end();
    assert!(harness.player.wait_until_finished(WAIT));

    harness.play(&["a"], 0, false);
    assert_eq!(
        harness.until_session_end(),
        vec![
            started("a"),
            ended("a"),
            session_ended(EndReason::QueueExhausted)
        ]
    );
}

#[test]
fn transport_keys_drive_session() {
    let harness = Harness::new(&[("a", track(100_000)), ("b", track(100_000))]);
    let interrupts = harness.player.interrupts();
    assert!(!interrupts.press(TransportKey::Next));

    harness.play(&["a", "b"], 0, false);
    assert_eq!(harness.next_event(), started("a"));
    assert!(interrupts.press(TransportKey::Next));
    assert_eq!(harness.next_event(), ended("a"));
    assert_eq!(harness.next_event(), started("b"));

    // Past two seconds of play, Previous restarts the track in place.
    assert!(wait_for(|| harness.player.time() > 2500));
    assert!(interrupts.press(TransportKey::Previous));
    assert!(wait_for(|| harness.counters.seeks.load(Ordering::SeqCst) == 1));
    assert!(harness.events.try_recv().is_err());

    assert!(interrupts.press(TransportKey::PlayPause));
    harness.wait_state(SessionState::Paused);
    assert!(interrupts.press(TransportKey::PlayPause));
    harness.wait_state(SessionState::Playing);

    assert!(interrupts.press(TransportKey::Stop));
    assert_eq!(
        harness.until_session_end(),
        vec![ended("b"), session_ended(EndReason::Stopped)]
    );
}

#[test]
fn watchdog_tears_down_stuck_engine() {
    let settings = PlayerSettings {
        watchdog_timeout_ms: 100,
        ..test_settings()
    };
    let stuck = Script {
        stall: Some((3, Duration::from_millis(800))),
        ..track(100_000)
    };
    let harness = Harness::with_settings(
        &[("a", stuck), ("b", track(5))],
        settings,
        null_sink_factory(false),
    );
    harness.play(&["a"], 0, false);

    assert_eq!(harness.next_event(), started("a"));
    assert_eq!(
        harness.next_event(),
        session_ended(EndReason::Watchdog)
    );
    assert_eq!(harness.player.state(), SessionState::Stopping);

    // The stuck thread still owns the session; a new play is refused.
    harness.play(&["b"], 0, false);
    assert!(harness.player.wait_until_finished(WAIT));
    assert_eq!(harness.player.state(), SessionState::Finished);
    assert!(harness
        .events
        .recv_timeout(Duration::from_millis(50))
        .is_err());

    harness.play(&["b"], 0, false);
    assert_eq!(
        harness.until_session_end(),
        vec![
            started("b"),
            ended("b"),
            session_ended(EndReason::QueueExhausted)
        ]
    );
}

#[test]
fn missing_output_ends_session() {
    let failing: SinkFactory = Arc::new(
        |_spec: &SinkSpec| -> Result<Box<dyn AudioSink>, SinkError> {
            Err(SinkError::Unavailable("no device".to_string()))
        },
    );
    let harness = Harness::with_settings(&[("a", track(5))], test_settings(), failing);
    harness.play(&["a"], 0, false);

    assert_eq!(
        harness.until_session_end(),
        vec![session_ended(EndReason::OutputUnavailable)]
    );
    assert_eq!(harness.counters.loads.load(Ordering::SeqCst), 0);
}

#[test]
fn telemetry_is_empty_without_session() {
    let harness = Harness::new(&[("a", track(5))]);
    let player = &harness.player;
    assert_eq!(player.info(), FrameInfo::default());
    assert!(player.channel_data().is_empty());
    assert!(player.instruments().is_empty());
    assert_eq!(player.time(), 0);
    assert!(!player.mute(0, true));
    assert_eq!(player.pattern_row(0, 0), None);
    assert!(!player.sample_data(
        &crate::engine::SampleRequest {
            trigger: false,
            instrument: 0,
            key: 0,
            period: 0,
            channel: 0,
            width: 16,
        },
        &mut [0u8; 16]
    ));
    assert_eq!(player.state(), SessionState::Idle);
    assert!(!player.is_alive());
    assert_eq!(player.current_file(), None);
}

#[test]
fn empty_play_is_ignored() {
    let harness = Harness::new(&[]);
    harness.player.play(Vec::new(), 0, false, false);
    assert!(!harness.player.is_alive());
    assert_eq!(harness.player.state(), SessionState::Idle);
}
