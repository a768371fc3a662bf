use std::path::Path;

use modplay_lib::SessionState;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame, Terminal,
};

use crate::controls::StatusSnapshot;

const KEY_HELP: &str = "space=play/pause  n/b=next/prev  ←/→=seek 5s  l=loop  c=call on/off  q=quit";

/// Everything one redraw shows.
pub struct Screen<'a> {
    pub status: &'a StatusSnapshot,
    pub queue: &'a [String],
    pub index: usize,
    pub state: SessionState,
    pub call_active: bool,
    pub log_lines: &'a [String],
}

pub fn draw(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, screen: &Screen) {
    let _ = terminal.draw(|f| {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(7),
                Constraint::Min(3),
            ])
            .split(f.size());
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[1]);

        let help = Paragraph::new(KEY_HELP)
            .style(Style::default().fg(Color::Blue))
            .block(Block::default().borders(Borders::ALL).title("modplay"));
        f.render_widget(help, rows[0]);

        draw_playback(f, body[0], screen);
        draw_queue(f, body[1], screen);
        draw_logs(f, rows[2], screen.log_lines);
    });
}

fn draw_playback(f: &mut Frame, area: Rect, screen: &Screen) {
    let (title, border) = if screen.call_active {
        ("Playback · held by call", Color::Red)
    } else {
        ("Playback", state_color(screen.state))
    };
    let widget = Paragraph::new(screen.status.text.as_str())
        .style(
            Style::default()
                .fg(state_color(screen.state))
                .add_modifier(Modifier::BOLD),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(title),
        );
    f.render_widget(widget, area);
}

fn draw_queue(f: &mut Frame, area: Rect, screen: &Screen) {
    let items: Vec<ListItem> = queue_items(screen.queue)
        .into_iter()
        .map(ListItem::new)
        .collect();
    let title = if screen.queue.is_empty() {
        "Queue".to_string()
    } else {
        format!("Queue {}/{}", screen.index + 1, screen.queue.len())
    };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .highlight_symbol("▶ ");
    let mut state = ListState::default();
    if !screen.queue.is_empty() {
        state.select(Some(screen.index.min(screen.queue.len() - 1)));
    }
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_logs(f: &mut Frame, area: Rect, log_lines: &[String]) {
    let visible = area.height.saturating_sub(2) as usize;
    let start = log_lines.len().saturating_sub(visible);
    let text = if log_lines.is_empty() {
        "No logs yet.".to_string()
    } else {
        log_lines[start..].join("\n")
    };
    let widget = Paragraph::new(text)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL).title("Logs"));
    f.render_widget(widget, area);
}

fn state_color(state: SessionState) -> Color {
    match state {
        SessionState::Playing => Color::Green,
        SessionState::Paused => Color::Yellow,
        SessionState::Loading => Color::Cyan,
        SessionState::Stopping | SessionState::Finished | SessionState::Idle => Color::Gray,
    }
}

/// Numbered queue entries showing only file names.
fn queue_items(queue: &[String]) -> Vec<String> {
    queue
        .iter()
        .enumerate()
        .map(|(i, track)| {
            let name = Path::new(track)
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or(track);
            format!("{:>2}. {}", i + 1, name)
        })
        .collect()
}
