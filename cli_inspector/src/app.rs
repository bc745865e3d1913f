use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use arena_mirror::{ChannelEvent, Credential, Session, TcpChannel};
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode};
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::*;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use crate::ui::{draw_ui, UiState, PAGE_ROWS};

pub struct InspectorApp {
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
    ui_state: UiState,
    session: Session<TcpChannel>,
    credential: Credential,
    receiver: UnboundedReceiver<ChannelEvent>,
    log_receiver: Receiver<String>,
    render_interval: Duration,
}

impl InspectorApp {
    pub fn new(
        session: Session<TcpChannel>,
        credential: Credential,
        receiver: UnboundedReceiver<ChannelEvent>,
        log_receiver: Receiver<String>,
        render_interval: Duration,
    ) -> Result<Self> {
        let stdout = std::io::stdout();
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        crossterm::terminal::enable_raw_mode()?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        Ok(Self {
            terminal,
            ui_state: UiState::default(),
            session,
            credential,
            receiver,
            log_receiver,
            render_interval,
        })
    }

    pub fn run(mut self) -> Result<()> {
        self.session.open(self.credential.clone());
        let mut last_draw = Instant::now()
            .checked_sub(self.render_interval)
            .unwrap_or_else(Instant::now);

        loop {
            while let Ok(event) = self.receiver.try_recv() {
                self.session.receive(event);
            }

            while let Ok(line) = self.log_receiver.try_recv() {
                self.ui_state.push_log(line);
            }

            if last_draw.elapsed() >= self.render_interval {
                let status = self.session.status();
                let mirror = self.session.mirror();
                let ui_state = &self.ui_state;
                self.terminal
                    .draw(|frame| draw_ui(frame, ui_state, status, mirror))?;
                last_draw = Instant::now();
            }

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => break,
                        KeyCode::Char('r') => {
                            info!("Reconnect requested");
                            self.session.teardown();
                            self.session.open(self.credential.clone());
                        }
                        KeyCode::Down | KeyCode::Char('j') => self.ui_state.scroll_down(1),
                        KeyCode::Up | KeyCode::Char('k') => self.ui_state.scroll_up(1),
                        KeyCode::PageDown => self.ui_state.scroll_down(PAGE_ROWS),
                        KeyCode::PageUp => self.ui_state.scroll_up(PAGE_ROWS),
                        KeyCode::Home => self.ui_state.scroll_to_top(),
                        _ => {}
                    }
                }
            }
        }

        self.session.teardown();
        self.terminal.show_cursor()?;
        crossterm::terminal::disable_raw_mode()?;
        Ok(())
    }
}
