use std::collections::VecDeque;

use arena_mirror::{ConnectionState, CoreMirror, ResolvedCell, SessionStatus};
use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::prelude::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

pub const PAGE_ROWS: usize = 10;

pub struct UiState {
    pub logs: VecDeque<String>,
    pub max_logs: usize,
    pub scroll_rows: usize,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            logs: VecDeque::new(),
            max_logs: 8,
            scroll_rows: 0,
        }
    }
}

impl UiState {
    pub fn push_log<S: Into<String>>(&mut self, line: S) {
        let mut text: String = line.into();
        while text.ends_with('\n') || text.ends_with('\r') {
            text.pop();
        }
        if text.is_empty() {
            return;
        }
        self.logs.push_front(text);
        while self.logs.len() > self.max_logs {
            self.logs.pop_back();
        }
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.scroll_rows = self.scroll_rows.saturating_add(rows);
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.scroll_rows = self.scroll_rows.saturating_sub(rows);
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll_rows = 0;
    }
}

pub fn draw_ui(
    frame: &mut Frame,
    state: &UiState,
    status: SessionStatus,
    mirror: Option<&CoreMirror>,
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(7),
        ])
        .split(frame.size());
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(rows[1]);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(body[1]);

    draw_header(frame, rows[0], status, mirror);
    draw_core(frame, body[0], state, mirror);
    draw_scoreboard(frame, side[0], mirror);
    draw_events(frame, side[1], mirror);
    draw_logs(frame, rows[2], state);
}

fn inner(area: Rect) -> Rect {
    area.inner(&Margin {
        vertical: 1,
        horizontal: 1,
    })
}

fn draw_header(frame: &mut Frame, area: Rect, status: SessionStatus, mirror: Option<&CoreMirror>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Arena Mirror Inspector");
    let state_color = match status.state {
        ConnectionState::Connected => Color::Green,
        ConnectionState::Connecting => Color::Yellow,
        ConnectionState::Disconnected => Color::Red,
    };
    let (cells, threads) = mirror
        .map(|mirror| (mirror.core_size(), mirror.threads().placed().count()))
        .unwrap_or((0, 0));
    let line = Line::from(vec![
        Span::styled(status.state.label(), Style::default().fg(state_color)),
        Span::raw(format!(" {:>4}s", status.since.elapsed().as_secs())),
        Span::raw(" | cells "),
        Span::styled(format!("{:>5}", cells), Style::default().fg(Color::Cyan)),
        Span::raw(" | threads "),
        Span::styled(format!("{:>4}", threads), Style::default().fg(Color::Magenta)),
        Span::raw(format!(
            " | msgs {} | dropped {} | connects {}",
            status.messages, status.dropped_items, status.connections
        )),
        Span::raw(" | r reconnect, j/k scroll, q exit"),
    ]);
    let text = Paragraph::new(line).wrap(Wrap { trim: true });
    frame.render_widget(block, area);
    frame.render_widget(text, inner(area));
}

fn draw_core(frame: &mut Frame, area: Rect, state: &UiState, mirror: Option<&CoreMirror>) {
    let block = Block::default().borders(Borders::ALL).title("Core");
    frame.render_widget(block, area);
    let area = inner(area);

    let Some(view) = mirror.and_then(CoreMirror::view) else {
        let waiting = Paragraph::new(Line::from(Span::styled(
            "Waiting for core snapshot...",
            Style::default().fg(Color::DarkGray),
        )));
        frame.render_widget(waiting, area);
        return;
    };

    let width = usize::from(area.width.max(1));
    let cells: Vec<ResolvedCell> = view.cells().collect();
    let total_rows = cells.len().div_ceil(width);
    let skip = state.scroll_rows.min(total_rows.saturating_sub(1));
    let lines: Vec<Line> = cells
        .chunks(width)
        .skip(skip)
        .take(usize::from(area.height))
        .map(|row| Line::from(row.iter().map(cell_span).collect::<Vec<_>>()))
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}

fn cell_span(cell: &ResolvedCell) -> Span<'static> {
    let glyph = if cell.occupant.is_some() { "◆" } else { "█" };
    Span::styled(glyph, Style::default().fg(terminal_color(&cell.color)))
}

fn terminal_color(color: &arena_mirror::Color) -> Color {
    match color.to_rgb() {
        Some((r, g, b)) => Color::Rgb(r, g, b),
        None => Color::Gray,
    }
}

fn draw_scoreboard(frame: &mut Frame, area: Rect, mirror: Option<&CoreMirror>) {
    let block = Block::default().borders(Borders::ALL).title("Scoreboard");
    let lines: Vec<Line> = mirror
        .map(|mirror| {
            mirror
                .scoreboard()
                .entries()
                .iter()
                .map(|entry| {
                    Line::from(vec![
                        Span::styled("■ ", Style::default().fg(terminal_color(&entry.color))),
                        Span::raw(entry.label.clone()),
                    ])
                })
                .collect()
        })
        .unwrap_or_default();
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(paragraph, inner(area));
}

fn draw_events(frame: &mut Frame, area: Rect, mirror: Option<&CoreMirror>) {
    let block = Block::default().borders(Borders::ALL).title("Events");
    let mut lines: Vec<Line> = Vec::new();
    if let Some(mirror) = mirror {
        for (age, batch) in mirror.events().batches().enumerate() {
            let marker_style = if age == 0 {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            for text in batch.lines() {
                lines.push(Line::from(vec![
                    Span::styled("• ", marker_style),
                    Span::raw(text),
                ]));
            }
        }
    }
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(paragraph, inner(area));
}

fn draw_logs(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default().borders(Borders::ALL).title("Logs");
    let lines: Vec<Line> = state
        .logs
        .iter()
        .map(|entry| Line::from(Span::raw(entry)))
        .collect();
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(paragraph, inner(area));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_lines_are_trimmed_and_capped() {
        let mut state = UiState::default();
        state.push_log("\n");
        for n in 0..12 {
            state.push_log(format!("line {}\r\n", n));
        }
        assert_eq!(state.logs.len(), state.max_logs);
        assert_eq!(state.logs.front().map(String::as_str), Some("line 11"));
    }

    #[test]
    fn scroll_never_underflows() {
        let mut state = UiState::default();
        state.scroll_up(3);
        assert_eq!(state.scroll_rows, 0);
        state.scroll_down(PAGE_ROWS);
        state.scroll_up(1);
        assert_eq!(state.scroll_rows, PAGE_ROWS - 1);
    }

    #[test]
    fn unparseable_tokens_fall_back_to_gray() {
        assert_eq!(terminal_color(&"#ff0000".into()), Color::Rgb(255, 0, 0));
        assert_eq!(terminal_color(&"chartreuse".into()), Color::Gray);
    }
}
