//! Session worker loop implementation.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError};

use log::{debug, error, info, warn};

use crate::audio::buffer::FrameBatch;
use crate::audio::sink::{AudioSink, SinkSpec};
use crate::engine::MAX_CHANNELS;
use crate::error::EngineError;
use crate::playback::events::{EndReason, PlayerEvent};
use crate::playback::interrupt::{resolve_key, KeyAction};
use crate::playback::queue::QueueManager;
use crate::playback::state::{SessionFlags, SessionState};
use crate::playback::watchdog::{TimeoutAction, Watchdog};

use super::context::SessionContext;

/// What the queue loop does after a track is done.
enum Advance {
    Play,
    Finish(EndReason),
}

/// Result of one pass through the per-track lifecycle.
struct TrackOutcome {
    /// The track loaded and started; failures count towards the skip guard.
    loaded: bool,
}

/// Run one session from sink creation to the final `SessionEnded` event.
pub(in crate::playback::player::runtime) fn run_session(ctx: SessionContext) {
    info!("session started");
    let watchdog = Watchdog::new(ctx.settings.watchdog_timeout(), watchdog_action(&ctx));

    let played = catch_unwind(AssertUnwindSafe(|| play_session(&ctx, &watchdog)));
    let reason = match played {
        Ok(reason) => reason,
        Err(_) => {
            error!("session thread panicked; closing session");
            ctx.flags.request_stop(EndReason::Stopped);
            close_session(&ctx)
        }
    };

    watchdog.stop();
    ctx.engine.set_live(false);
    *ctx.current_file
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = None;

    info!("session ended: {:?}", reason);
    ctx.events.emit(PlayerEvent::SessionEnded { reason });
}

/// Timeout action: tear the session down without touching a busy engine.
fn watchdog_action(ctx: &SessionContext) -> TimeoutAction {
    let flags = ctx.flags.clone();
    let engine = ctx.engine.clone();
    let events = ctx.events.clone();
    Arc::new(move || {
        if !flags.tear_down() {
            return;
        }
        error!("session stopped by watchdog: decode loop unresponsive");
        if !engine.try_mark_dead() {
            warn!("engine still busy; telemetry waits until the decode call returns");
        }
        events.emit(PlayerEvent::SessionEnded {
            reason: EndReason::Watchdog,
        });
    })
}

fn play_session(ctx: &SessionContext, watchdog: &Watchdog) -> EndReason {
    let spec = SinkSpec {
        sample_rate: ctx.settings.sample_rate,
        channels: ctx.settings.channels(),
    };
    let mut sink = match (ctx.sink_factory)(&spec) {
        Ok(sink) => sink,
        Err(err) => {
            error!("cannot open audio output: {}", err);
            ctx.flags.request_stop(EndReason::OutputUnavailable);
            return close_session(ctx);
        }
    };

    let mut batch = FrameBatch::new(
        ctx.settings.batch_samples(sink.min_buffer_bytes()),
        spec.channels,
        spec.sample_rate,
    );
    watchdog.start();

    let mut failures = 0usize;
    loop {
        let Some(path) = current_track(ctx) else {
            return close_session(ctx);
        };
        let outcome = play_track(ctx, sink.as_mut(), &mut batch, watchdog, &path);
        failures = if outcome.loaded { 0 } else { failures + 1 };

        match advance(ctx, &outcome, &mut failures) {
            Advance::Play => continue,
            Advance::Finish(reason) => return reason,
        }
    }
}

fn current_track(ctx: &SessionContext) -> Option<String> {
    let mut slot = ctx.queue.lock().unwrap_or_else(PoisonError::into_inner);
    slot.as_mut()
        .map(|queue| track_to_play(queue, &ctx.flags).to_string())
}

/// Read the track to load next.
///
/// A queue swapped in by `play` since the last read is already the one
/// being read here, so its restart and the skip aimed at the replaced
/// track are consumed instead of cutting the new start track short.
fn track_to_play<'a>(queue: &'a mut QueueManager, flags: &SessionFlags) -> &'a str {
    if flags.take_restart() {
        flags.take_skip();
        queue.restart();
    }
    queue.filename()
}

/// Close the session under the queue lock.
///
/// `play` takes the same lock before deciding between retargeting and
/// spawning, so it either sees the session open and is picked up by the
/// loop, or sees it closed and spawns a new one.
fn close_session(ctx: &SessionContext) -> EndReason {
    let _queue = ctx.queue.lock().unwrap_or_else(PoisonError::into_inner);
    ctx.flags.close_session()
}

/// Decide the next track, or close the session.
fn advance(ctx: &SessionContext, outcome: &TrackOutcome, failures: &mut usize) -> Advance {
    let mut slot = ctx.queue.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(queue) = slot.as_mut() else {
        return Advance::Finish(ctx.flags.close_session());
    };

    ctx.flags.take_skip();
    if ctx.flags.take_restart() {
        debug!("queue replaced; restarting at track {}", queue.index());
        queue.restart();
        *failures = 0;
        return Advance::Play;
    }
    if ctx.flags.stop_requested() {
        return Advance::Finish(ctx.flags.close_session());
    }
    if ctx.flags.return_to_prev() {
        // A loaded track replays itself at the head of the queue; a failing
        // one falls through to forward navigation instead of retrying.
        if queue.previous() || outcome.loaded {
            return Advance::Play;
        }
        ctx.flags.clear_return_to_prev();
    }
    if *failures >= queue.size() {
        warn!("every track in the queue failed to load; ending session");
        return Advance::Finish(ctx.flags.close_session());
    }
    if queue.next() {
        Advance::Play
    } else {
        Advance::Finish(ctx.flags.close_session())
    }
}

/// Load, start and play one track to completion.
fn play_track(
    ctx: &SessionContext,
    sink: &mut dyn AudioSink,
    batch: &mut FrameBatch,
    watchdog: &Watchdog,
    path: &str,
) -> TrackOutcome {
    ctx.flags.set_state(SessionState::Loading);
    watchdog.refresh();
    *ctx.current_file
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(path.to_string());

    let loaded = {
        let mut slot = ctx.engine.lock();
        if !slot.engine.accepts(path) {
            warn!("{}: unrecognized format", path);
            None
        } else if let Err(err) = slot.engine.load(path) {
            error!("{}: {}", path, err);
            None
        } else {
            let name = slot.engine.module_name();
            let name = if name.is_empty() { path.to_string() } else { name };
            Some((name, slot.engine.instruments()))
        }
    };
    let Some((name, instruments)) = loaded else {
        return TrackOutcome { loaded: false };
    };

    ctx.flags.clear_return_to_prev();
    info!("playing {}", name);
    ctx.events.emit(PlayerEvent::TrackStarted {
        name: name.clone(),
        instruments,
    });

    let started = {
        let mut slot = ctx.engine.lock();
        for channel in 0..MAX_CHANNELS {
            slot.engine.mute(channel, false);
        }
        match slot
            .engine
            .start(ctx.settings.sample_rate, ctx.settings.channels())
        {
            Ok(()) => {
                for parameter in ctx.settings.mixer_parameters() {
                    slot.engine.set_mixer(parameter);
                }
                slot.live = true;
                Some(slot.engine.loop_count())
            }
            Err(err) => {
                error!("{}: engine failed to start: {}", path, err);
                None
            }
        }
    };

    let loaded = match started {
        Some(loops) => {
            // A track reached during a call starts held.
            if !ctx.flags.is_paused() {
                sink.play();
                ctx.flags.set_state(SessionState::Playing);
            }
            play_frames(ctx, sink, batch, watchdog, loops);
            true
        }
        None => false,
    };

    {
        let mut slot = ctx.engine.lock();
        slot.live = false;
        slot.engine.end();
    }
    ctx.events.emit(PlayerEvent::TrackEnded { name });
    ctx.engine.lock().engine.release();
    sink.stop();

    TrackOutcome { loaded }
}

/// Decode and write frames until the track ends or is interrupted.
fn play_frames(
    ctx: &SessionContext,
    sink: &mut dyn AudioSink,
    batch: &mut FrameBatch,
    watchdog: &Watchdog,
    initial_loops: u32,
) {
    let mut loops = initial_loops;
    loop {
        if ctx.flags.take_skip() {
            break;
        }
        if ctx.flags.is_paused() {
            wait_out_pause(ctx, sink, watchdog);
            continue;
        }

        let filled = {
            let mut slot = ctx.engine.lock();
            if let Err(err) = slot.engine.decode_frame() {
                match err {
                    EngineError::EndOfModule => debug!("end of module"),
                    err => warn!("decode stopped: {}", err),
                }
                break;
            }
            let count = slot.engine.loop_count();
            if ctx.flags.looped() {
                loops = count;
            } else if count != loops {
                debug!("module looped; ending track");
                break;
            }
            slot.engine.fill_buffer(batch)
        };

        if filled > 0 {
            if let Err(err) = sink.write(batch) {
                error!("{}", err);
                ctx.flags.request_stop(EndReason::OutputUnavailable);
                break;
            }
        }

        #[cfg(feature = "debug")]
        log::debug!("wrote {} bytes", filled);

        watchdog.refresh();
        apply_pending_key(ctx);
    }
}

/// Hold the loop while paused, keeping the watchdog fed and keys live.
///
/// Returns early on a pending skip; output stays paused if the pause does.
fn wait_out_pause(ctx: &SessionContext, sink: &mut dyn AudioSink, watchdog: &Watchdog) {
    sink.pause();
    ctx.flags.set_state(SessionState::Paused);
    info!("paused");

    let poll = ctx.settings.pause_poll();
    while ctx.flags.wait_while_paused(poll) {
        watchdog.refresh();
        apply_pending_key(ctx);
    }

    watchdog.refresh();
    if !ctx.flags.is_paused() && !ctx.flags.stop_requested() {
        sink.play();
        ctx.flags.set_state(SessionState::Playing);
        info!("resumed");
    }
}

/// Apply a transport key parked by the interrupt coordinator.
fn apply_pending_key(ctx: &SessionContext) {
    let Some(key) = ctx.flags.take_pending_key() else {
        return;
    };
    let elapsed = ctx
        .engine
        .with_live(|engine| u64::from(engine.elapsed_ms()))
        .unwrap_or(0);
    let action = resolve_key(key, elapsed);
    debug!("transport key {:?} -> {:?}", key, action);

    match action {
        KeyAction::Skip => ctx.flags.skip_track(),
        KeyAction::Rewind => {
            ctx.engine.with_live(|engine| engine.seek(0));
        }
        KeyAction::Previous => ctx.flags.previous_track(),
        KeyAction::Stop => ctx.flags.request_stop(EndReason::Stopped),
        KeyAction::TogglePause => ctx.flags.toggle_pause(),
    }
}
