use std::{
    io,
    sync::{mpsc, Arc},
    thread::sleep,
    time::Duration,
};

use clap::ArgMatches;
use crossterm::{
    cursor, execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{info, warn};
use modplay_lib::audio::sink::{default_sink_factory, null_sink_factory};
use modplay_lib::engine::SampledEngine;
use modplay_lib::playback::broadcast::{ChannelSubscriber, SubscriberHandle};
use modplay_lib::settings::PlayerSettings;
use modplay_lib::{EndReason, ModPlayer, PlayerEvent};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::cli::options::{self, RunOptions};
use crate::controls::{self, KeyHandler};
use crate::logging::{self, LogBuffer};
use crate::ui;

const UI_TICK: Duration = Duration::from_millis(50);

pub fn run(args: &ArgMatches, log_buffer: LogBuffer) -> Result<i32, Box<dyn std::error::Error>> {
    if let Some(create) = args.subcommand_matches("create") {
        if create.subcommand_matches("settings-json").is_some() {
            println!(
                "{}",
                serde_json::to_string_pretty(&PlayerSettings::default())?
            );
            return Ok(0);
        }
    }

    let options = options::resolve(args)?;
    info!("Starting modplay with {} file(s)", options.files.len());

    let sink_factory = if options.null_output {
        null_sink_factory(true)
    } else {
        default_sink_factory()
    };
    let player = ModPlayer::with_sink_factory(
        Box::new(SampledEngine::new()),
        options.settings.clone(),
        sink_factory,
    );

    let (tx, rx) = mpsc::channel();
    let subscriber: SubscriberHandle = Arc::new(ChannelSubscriber::new(tx));
    player.register_callback(subscriber.clone());

    if options.loop_module {
        player.toggle_loop();
    }
    player.play(
        options.files.clone(),
        options.start,
        options.shuffle,
        options.loop_list,
    );

    let mut session = SessionView::default();
    if options.interactive {
        run_interactive(&player, &options, &rx, &mut session, &log_buffer);
    } else {
        while player.is_alive() {
            session.drain(&rx, &options);
            sleep(UI_TICK);
        }
    }

    if !player.wait_until_finished(Duration::from_secs(5)) {
        warn!("session thread did not finish in time");
    }
    session.drain(&rx, &options);
    player.unregister_callback(&subscriber);

    Ok(match session.end_reason {
        Some(EndReason::OutputUnavailable) => 1,
        Some(EndReason::Watchdog) => 2,
        _ => 0,
    })
}

/// What the front end has learned from the event stream.
#[derive(Default)]
struct SessionView {
    title: Option<String>,
    end_reason: Option<EndReason>,
}

impl SessionView {
    fn drain(&mut self, rx: &mpsc::Receiver<PlayerEvent>, options: &RunOptions) {
        while let Ok(event) = rx.try_recv() {
            if options.json_events {
                println!("{}", event.to_json());
            }
            match &event {
                PlayerEvent::TrackStarted { name, instruments } => {
                    info!("Now playing {} ({} instruments)", name, instruments.len());
                    self.title = Some(name.clone());
                }
                PlayerEvent::TrackEnded { name } => {
                    info!("Finished {}", name);
                }
                PlayerEvent::SessionEnded { reason } => {
                    info!("Session ended: {:?}", reason);
                    self.end_reason = Some(*reason);
                }
            }
        }
    }
}

fn run_interactive(
    player: &ModPlayer,
    options: &RunOptions,
    rx: &mpsc::Receiver<PlayerEvent>,
    session: &mut SessionView,
    log_buffer: &LogBuffer,
) {
    let _raw_mode = RawModeGuard::enable().ok();
    #[cfg(unix)]
    let _stderr_capture = logging::capture_stderr(log_buffer.clone());
    let mut terminal = {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, EnterAlternateScreen, cursor::Hide);
        let backend = CrosstermBackend::new(stdout);
        Terminal::new(backend).ok()
    };

    let mut keys = KeyHandler::new(player.interrupts());

    while player.is_alive() {
        session.drain(rx, options);

        if let Some(term) = terminal.as_mut() {
            let (tracks, index) = player.queue_snapshot().unwrap_or_default();
            let state = player.state();
            let status = controls::status_text(controls::StatusArgs {
                title: session.title.clone(),
                index,
                size: tracks.len(),
                time_ms: player.time(),
                duration_ms: player.module_vars().duration_ms,
                state,
                looped: player.is_looped(),
                call_active: keys.call_active(),
                info: player.info(),
            });
            let log_lines = logging::snapshot(log_buffer);
            ui::draw(
                term,
                &ui::Screen {
                    status: &status,
                    queue: &tracks,
                    index,
                    state,
                    call_active: keys.call_active(),
                    log_lines: &log_lines,
                },
            );
        }

        if !keys.handle_key_event(player) {
            break;
        }

        sleep(UI_TICK);
    }

    if let Some(mut term) = terminal {
        let _ = term.show_cursor();
        let stdout = term.backend_mut();
        let _ = execute!(stdout, LeaveAlternateScreen, cursor::Show);
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
