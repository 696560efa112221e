use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph},
};
use std::io;
use std::time::Duration;
use tracing::{info, warn};

use crate::bus::Dialer;
use crate::error::{BusError, BusResult};
use crate::models::{NowPlaying, PlaybackStatus, format_time};
use crate::player::PlayerClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Previous,
    Next,
    PlayPause,
    ToggleShuffle,
    /// Volume in percent, already clamped to 100.
    SetVolume(u8),
    Refresh,
    /// Leave the dashboard, player keeps running.
    Exit,
    /// Quit the player, then leave the dashboard.
    QuitPlayer,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub fn key_action(code: KeyCode) -> Option<Action> {
    match code {
        KeyCode::Char('h') => Some(Action::Previous),
        KeyCode::Char('l') => Some(Action::Next),
        KeyCode::Char(' ') => Some(Action::PlayPause),
        KeyCode::Char('r') => Some(Action::Refresh),
        _ => None,
    }
}

pub fn parse_command(line: &str) -> Action {
    match line.trim() {
        "q" => Action::Exit,
        "q!" => Action::QuitPlayer,
        "next" => Action::Next,
        "prev" => Action::Previous,
        "toggle" => Action::PlayPause,
        "shuffle" => Action::ToggleShuffle,
        line => match line.split_once(' ') {
            Some(("vol", percent)) => percent
                .trim()
                .parse::<u32>()
                .map(|p| Action::SetVolume(p.min(100) as u8))
                .unwrap_or(Action::Ignore),
            _ => Action::Ignore,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    Pending,
    Submitted(String),
    Cancelled,
}

/// Collects a command line until Enter or Esc.
#[derive(Debug, Default)]
pub struct LineEditor {
    buffer: String,
}

impl LineEditor {
    pub fn feed(&mut self, code: KeyCode) -> LineEvent {
        match code {
            KeyCode::Enter => LineEvent::Submitted(std::mem::take(&mut self.buffer)),
            KeyCode::Esc => {
                self.buffer.clear();
                LineEvent::Cancelled
            }
            KeyCode::Backspace => {
                self.buffer.pop();
                LineEvent::Pending
            }
            KeyCode::Char(c) => {
                self.buffer.push(c);
                LineEvent::Pending
            }
            _ => LineEvent::Pending,
        }
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }
}

enum View {
    Playing(NowPlaying),
    Fault(String),
}

pub struct Dashboard<D: Dialer> {
    player: PlayerClient<D>,
    redraw_interval: Duration,
    view: View,
    command: Option<LineEditor>,
}

impl<D: Dialer> Dashboard<D> {
    pub fn new(player: PlayerClient<D>, redraw_interval: Duration) -> Self {
        Self {
            player,
            redraw_interval,
            view: View::Fault("Waiting for player...".to_string()),
            command: None,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.main_loop(&mut terminal);

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        self.refresh()?;

        loop {
            terminal.draw(|f| self.ui(f))?;

            if event::poll(self.redraw_interval)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key)? == Flow::Exit {
                        info!("Leaving dashboard");
                        return Ok(());
                    }
                }
            } else if self.command.is_none() {
                self.refresh()?;
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> BusResult<Flow> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Ok(Flow::Exit);
        }

        if let Some(editor) = self.command.as_mut() {
            return match editor.feed(key.code) {
                LineEvent::Pending => Ok(Flow::Continue),
                LineEvent::Cancelled => {
                    self.command = None;
                    Ok(Flow::Continue)
                }
                LineEvent::Submitted(line) => {
                    self.command = None;
                    self.perform(parse_command(&line))
                }
            };
        }

        if key.code == KeyCode::Char(':') {
            self.command = Some(LineEditor::default());
            return Ok(Flow::Continue);
        }

        match key_action(key.code) {
            Some(action) => self.perform(action),
            None => Ok(Flow::Continue),
        }
    }

    /// Runs one command against the player. A fault replaces the view;
    /// only an unrecoverable one is returned.
    pub fn perform(&mut self, action: Action) -> BusResult<Flow> {
        let outcome = match action {
            Action::Exit => return Ok(Flow::Exit),
            Action::QuitPlayer => {
                return match self.player.quit() {
                    Err(e) if e.is_unrecoverable() => Err(e),
                    Err(e) => {
                        warn!("Player did not quit: {e}");
                        Ok(Flow::Exit)
                    }
                    Ok(()) => Ok(Flow::Exit),
                };
            }
            Action::Previous => self.player.play_previous().map(drop),
            Action::Next => self.player.play_next().map(drop),
            Action::PlayPause => self.player.play_pause(),
            Action::ToggleShuffle => self.player.toggle_shuffle().map(drop),
            Action::SetVolume(percent) => {
                self.player.set_volume(f64::from(percent) / 100.0).map(drop)
            }
            Action::Refresh | Action::Ignore => Ok(()),
        };

        match outcome {
            Ok(()) => self.refresh()?,
            Err(e) => self.show_fault(e)?,
        }
        Ok(Flow::Continue)
    }

    pub fn refresh(&mut self) -> BusResult<()> {
        match self.player.now_playing() {
            Ok(now) => {
                self.view = View::Playing(now);
                Ok(())
            }
            Err(e) => self.show_fault(e),
        }
    }

    fn show_fault(&mut self, err: BusError) -> BusResult<()> {
        if err.is_unrecoverable() {
            return Err(err);
        }
        warn!("{err}");
        self.view = View::Fault(err.to_string());
        Ok(())
    }

    fn ui(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),    // Now playing
                Constraint::Length(3), // Command line
            ])
            .split(f.area());

        self.render_now_playing(f, chunks[0]);
        self.render_command(f, chunks[1]);
    }

    fn render_now_playing(&self, f: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));

        let inner = block.inner(area);
        f.render_widget(block, area);

        let lines = match &self.view {
            View::Playing(now) => now_playing_lines(now),
            View::Fault(message) => vec![Line::styled(
                message.clone(),
                Style::default().fg(Color::Red),
            )],
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(0),
                Constraint::Length(lines.len() as u16),
                Constraint::Min(0),
            ])
            .split(inner);

        let text = Paragraph::new(lines).alignment(Alignment::Center);
        f.render_widget(text, chunks[1]);
    }

    fn render_command(&self, f: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));

        let (text, style) = match &self.command {
            Some(editor) => (format!(":{}▌", editor.text()), Style::default()),
            None => (
                "h:Prev  l:Next  Space:Play/Pause  r:Redraw  ::Command".to_string(),
                Style::default().fg(Color::DarkGray),
            ),
        };

        let line = Paragraph::new(text).style(style).block(block);
        f.render_widget(line, area);
    }
}

fn now_playing_lines(now: &NowPlaying) -> Vec<Line<'static>> {
    let dim = Style::default().fg(Color::DarkGray);
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let mut lines = vec![
        Line::styled("Now playing:", dim),
        Line::styled(now.track.title.clone(), bold),
        Line::raw(""),
        Line::styled("from", dim),
        Line::raw(now.track.artist.clone()),
        Line::raw(""),
        Line::styled("on", dim),
        Line::raw(now.track.album.clone()),
    ];

    if now.status == PlaybackStatus::Paused {
        lines.push(Line::raw(""));
        lines.push(Line::styled(
            "Paused",
            Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::SLOW_BLINK),
        ));
    }

    if let Some(detail) = detail_line(now) {
        lines.push(Line::raw(""));
        lines.push(Line::styled(detail, Style::default().fg(Color::Cyan)));
    }

    lines
}

fn detail_line(now: &NowPlaying) -> Option<String> {
    let mut parts = Vec::new();

    match (now.position, now.track.length) {
        (Some(position), Some(length)) => {
            parts.push(format!("{} / {}", format_time(position), format_time(length)))
        }
        (Some(time), None) | (None, Some(time)) => parts.push(format_time(time)),
        (None, None) => {}
    }
    if now.shuffle == Some(true) {
        parts.push("Shuffle".to_string());
    }
    if let Some(volume) = now.volume {
        parts.push(format!("Vol: {}%", (volume * 100.0).round() as u32));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("  "))
    }
}
