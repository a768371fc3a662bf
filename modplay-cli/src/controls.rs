use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use modplay_lib::engine::FrameInfo;
use modplay_lib::playback::interrupt::{CallState, InterruptCoordinator, TransportKey};
use modplay_lib::{ModPlayer, SessionState};

const SEEK_STEP_SECONDS: u64 = 5;

pub struct StatusSnapshot {
    pub text: String,
}

pub struct StatusArgs {
    pub title: Option<String>,
    pub index: usize,
    pub size: usize,
    pub time_ms: u64,
    pub duration_ms: u32,
    pub state: SessionState,
    pub looped: bool,
    pub call_active: bool,
    pub info: FrameInfo,
}

/// Notification-style title: `title (index/size)` when the queue has more
/// than one entry.
pub fn queue_title(title: &str, index: usize, size: usize) -> String {
    if size > 1 {
        format!("{} ({}/{})", title, index + 1, size)
    } else {
        title.to_string()
    }
}

pub fn status_text(args: StatusArgs) -> StatusSnapshot {
    let state = match args.state {
        SessionState::Playing => "▶ Playing",
        SessionState::Paused => "⏸ Paused",
        SessionState::Loading => "… Loading",
        SessionState::Stopping => "■ Stopping",
        SessionState::Idle | SessionState::Finished => "■ Stopped",
    };
    let title = args
        .title
        .as_deref()
        .map(|title| queue_title(title, args.index, args.size))
        .unwrap_or_else(|| "-".to_string());
    let current = format_time(args.time_ms);
    let total = format_time(u64::from(args.duration_ms));
    let text = format!(
        "{}   {}\n{} / {}   loop: {}{}\norder {:02X} pattern {:02X} row {:02X}/{:02X}  speed {} bpm {}",
        state,
        title,
        current,
        total,
        if args.looped { "on" } else { "off" },
        if args.call_active { "   [call]" } else { "" },
        args.info.order,
        args.info.pattern,
        args.info.row,
        args.info.num_rows,
        args.info.speed,
        args.info.bpm,
    );

    StatusSnapshot { text }
}

/// Maps terminal keys onto the transport keys a media remote would send.
pub struct KeyHandler {
    interrupts: InterruptCoordinator,
    call_active: bool,
}

impl KeyHandler {
    pub fn new(interrupts: InterruptCoordinator) -> Self {
        Self {
            interrupts,
            call_active: false,
        }
    }

    pub fn call_active(&self) -> bool {
        self.call_active
    }

    /// Poll one key event. Returns `false` when the user asked to quit.
    pub fn handle_key_event(&mut self, player: &ModPlayer) -> bool {
        if !event::poll(Duration::from_millis(100)).unwrap_or(false) {
            return true;
        }
        let Ok(Event::Key(key)) = event::read() else {
            return true;
        };
        if key.kind != KeyEventKind::Press {
            return true;
        }

        match key.code {
            KeyCode::Char('q') => {
                player.stop();
                return false;
            }
            KeyCode::Char(' ') => {
                self.interrupts.press(TransportKey::PlayPause);
            }
            KeyCode::Char('n') | KeyCode::Down => {
                self.interrupts.press(TransportKey::Next);
            }
            KeyCode::Char('b') | KeyCode::Up => {
                self.interrupts.press(TransportKey::Previous);
            }
            KeyCode::Char('l') | KeyCode::Char('L') => {
                player.toggle_loop();
            }
            KeyCode::Char('c') | KeyCode::Char('C') => {
                self.call_active = !self.call_active;
                let state = if self.call_active {
                    CallState::OffHook
                } else {
                    CallState::Idle
                };
                self.interrupts.call_state(state);
            }
            KeyCode::Left => {
                let seconds = player.time() / 1000;
                player.seek(seconds.saturating_sub(SEEK_STEP_SECONDS) as u32);
            }
            KeyCode::Right => {
                let seconds = player.time() / 1000;
                player.seek((seconds + SEEK_STEP_SECONDS) as u32);
            }
            _ => {}
        }

        true
    }
}

fn format_time(time_ms: u64) -> String {
    let seconds = time_ms / 1000;
    let minutes = seconds / 60;
    let seconds = seconds % 60;
    let hours = minutes / 60;
    let minutes = minutes % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_shows_position_for_longer_queues() {
        assert_eq!(queue_title("Space Debris", 1, 4), "Space Debris (2/4)");
        assert_eq!(queue_title("Space Debris", 0, 1), "Space Debris");
    }

    #[test]
    fn status_includes_time_and_loop_state() {
        let status = status_text(StatusArgs {
            title: Some("intro".to_string()),
            index: 0,
            size: 2,
            time_ms: 61_500,
            duration_ms: 3_600_000,
            state: SessionState::Paused,
            looped: true,
            call_active: true,
            info: FrameInfo::default(),
        });
        assert!(status.text.starts_with("⏸ Paused   intro (1/2)"));
        assert!(status.text.contains("00:01:01 / 01:00:00   loop: on   [call]"));
    }
}
