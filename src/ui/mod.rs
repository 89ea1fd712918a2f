// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Display side of the metronome.
//!
//! Provides the display projection the scheduler feeds, the sinks that
//! receive it, and a ratatui-based terminal interface with transport
//! display and a segmented song progress bar.

mod display;
mod progress;
mod transport;

pub use display::{part_fill, project, DisplayEvent, DisplaySink, DisplaySnapshot, DisplayTimeline};
pub use progress::{part_color, segment_widths, ProgressWidget};
pub use transport::{BeatDots, TransportWidget};

use std::io::{self, Stdout};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use tracing::{debug, info};

use crate::arrangement::Song;
use crate::config::PlaybackConfig;

/// UI state shared between the display sink and the render loop
#[derive(Debug, Clone)]
pub struct UiState {
    /// Transport state
    pub transport: TransportState,
    /// Song being shown
    pub song: Song,
    /// Snapshot currently on screen
    pub snapshot: Option<DisplaySnapshot>,
    /// Snapshots waiting for their beat to sound
    pub timeline: DisplayTimeline,
    /// Measure of the last beat handed to the timeline
    pub scheduled_measure: u32,
    /// Last beat of the song has been scheduled
    pub complete: bool,
    /// Help text visible
    pub show_help: bool,
    /// Status message
    pub status_message: Option<String>,
    /// Status message timestamp
    pub status_time: Option<Instant>,
}

impl Default for UiState {
    fn default() -> Self {
        let config = PlaybackConfig::default();
        Self {
            transport: TransportState::from_config("default", &config),
            song: Song::new(&config.song_parts),
            snapshot: None,
            timeline: DisplayTimeline::new(),
            scheduled_measure: 0,
            complete: false,
            show_help: false,
            status_message: None,
            status_time: None,
        }
    }
}

impl UiState {
    /// Show a profile while stopped
    pub fn load_profile(&mut self, name: &str, config: &PlaybackConfig) {
        let playing = self.transport.playing;
        self.transport = TransportState::from_config(name, config);
        self.transport.playing = playing;
        self.song = Song::new(&config.song_parts);
    }

    /// Move snapshots whose beat has sounded onto the screen
    pub fn release(&mut self, now: f64) {
        if let Some(snapshot) = self.timeline.release(now) {
            self.snapshot = Some(snapshot);
        }
    }

    /// Whether the song has finished on screen as well as in the scheduler
    pub fn is_finished(&self) -> bool {
        self.complete && self.timeline.is_empty()
    }

    /// Fill level of each progress segment
    pub fn progress(&self) -> Vec<f64> {
        let measure = if self.is_finished() {
            self.song.total_measures() + 1
        } else {
            self.snapshot.as_ref().map(|s| s.measure).unwrap_or(0)
        };
        part_fill(&self.song, measure)
    }

    /// Set a status message that will be displayed temporarily
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_time = Some(Instant::now());
    }

    /// Clear expired status message
    pub fn clear_expired_status(&mut self) {
        if let Some(time) = self.status_time {
            if time.elapsed() > Duration::from_secs(3) {
                self.status_message = None;
                self.status_time = None;
            }
        }
    }
}

/// Transport state for UI display
#[derive(Debug, Clone, PartialEq)]
pub struct TransportState {
    /// Whether playing
    pub playing: bool,
    /// Tempo in BPM
    pub tempo: u32,
    /// Time signature numerator
    pub beats_per_measure: u32,
    /// Time signature denominator
    pub beat_unit: u32,
    /// Selected profile name
    pub profile: String,
}

impl Default for TransportState {
    fn default() -> Self {
        Self::from_config("default", &PlaybackConfig::default())
    }
}

impl TransportState {
    /// Transport fields for a profile
    pub fn from_config(profile: &str, config: &PlaybackConfig) -> Self {
        Self {
            playing: false,
            tempo: config.tempo,
            beats_per_measure: config.beats_per_measure,
            beat_unit: config.beat_unit,
            profile: profile.to_string(),
        }
    }
}

/// `DisplaySink` feeding the terminal UI.
///
/// Snapshots are queued on the timeline and only shown once the audio
/// clock reaches their beat.
#[derive(Debug, Clone)]
pub struct TerminalSink {
    state: Arc<Mutex<UiState>>,
}

impl TerminalSink {
    /// Create a sink writing into shared UI state
    pub fn new(state: Arc<Mutex<UiState>>) -> Self {
        Self { state }
    }
}

impl DisplaySink for TerminalSink {
    fn update_display(&mut self, event: DisplayEvent) {
        if let Ok(mut state) = self.state.lock() {
            state.complete = false;
            state.timeline.push(event);
        }
    }

    fn update_progress(&mut self, measure: u32) {
        // The progress bar itself follows the released snapshot
        if let Ok(mut state) = self.state.lock() {
            state.scheduled_measure = measure;
        }
    }

    fn clear(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.timeline.clear();
            state.scheduled_measure = 0;
            state.snapshot = None;
            state.complete = false;
        }
    }

    fn song_complete(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.complete = true;
        }
    }
}

/// `DisplaySink` that logs each beat, for headless runs
#[derive(Debug, Default)]
pub struct LogSink {
    beats: u64,
    completed: bool,
}

impl LogSink {
    /// Create a new log sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Beats logged since the last clear
    pub fn beats(&self) -> u64 {
        self.beats
    }

    /// Whether the song ran to the end
    pub fn completed(&self) -> bool {
        self.completed
    }
}

impl DisplaySink for LogSink {
    fn update_display(&mut self, event: DisplayEvent) {
        let s = &event.snapshot;
        self.beats += 1;
        self.completed = false;
        info!(
            at = format_args!("{:.3}", event.at),
            part = %s.part_name,
            measure = format_args!("{}/{}", s.measure_in_part, s.measures_in_part),
            beat = format_args!("{}/{}", s.beat_in_measure, s.beats_per_measure),
            accent = s.is_accent,
            progress = format_args!("{:.0}%", s.fraction_of_song_complete * 100.0),
            "beat"
        );
    }

    fn update_progress(&mut self, measure: u32) {
        debug!(measure, "progress");
    }

    fn clear(&mut self) {
        self.beats = 0;
        info!("display cleared");
    }

    fn song_complete(&mut self) {
        self.completed = true;
        info!(beats = self.beats, "song complete");
    }
}

/// Key event result
#[derive(Debug, Clone, PartialEq)]
pub enum KeyAction {
    /// No action needed
    None,
    /// Quit the application
    Quit,
    /// Start or stop playback
    TogglePlay,
    /// Stop playback
    Stop,
    /// Increase tempo
    TempoUp,
    /// Decrease tempo
    TempoDown,
    /// Select the next profile
    NextProfile,
    /// Select the previous profile
    PreviousProfile,
    /// Toggle help
    ToggleHelp,
}

/// Terminal UI application
pub struct App {
    state: Arc<Mutex<UiState>>,
    terminal: Terminal<CrosstermBackend<Stdout>>,
    frame_rate: u32,
    running: bool,
}

impl App {
    /// Create a new app with shared state
    pub fn new(state: Arc<Mutex<UiState>>) -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            state,
            terminal,
            frame_rate: 60,
            running: true,
        })
    }

    /// Get shared state handle
    pub fn state(&self) -> Arc<Mutex<UiState>> {
        Arc::clone(&self.state)
    }

    /// Set frame rate
    pub fn set_frame_rate(&mut self, fps: u32) {
        self.frame_rate = fps.clamp(1, 120);
    }

    /// Check if running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stop the app
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Handle a key event
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> KeyAction {
        let action = key_action(code, modifiers);
        match action {
            KeyAction::Quit => self.quit(),
            KeyAction::ToggleHelp => {
                if let Ok(mut state) = self.state.lock() {
                    state.show_help = !state.show_help;
                }
            }
            _ => {}
        }
        action
    }

    /// Poll for events with timeout
    pub fn poll_event(&self) -> io::Result<Option<Event>> {
        let timeout = Duration::from_millis(1000 / self.frame_rate as u64);
        if event::poll(timeout)? {
            Ok(Some(event::read()?))
        } else {
            Ok(None)
        }
    }

    /// Draw the UI as of audio-clock time `now`
    pub fn draw(&mut self, now: f64) -> io::Result<()> {
        let state = {
            let mut shared = self
                .state
                .lock()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "UI state lock poisoned"))?;
            shared.release(now);
            shared.clear_expired_status();
            shared.clone()
        };

        self.terminal.draw(|frame| {
            let area = frame.area();

            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(4), // Transport
                    Constraint::Length(3), // Progress
                    Constraint::Min(3),    // Parts
                    Constraint::Length(1), // Status bar
                ])
                .split(area);

            frame.render_widget(
                TransportWidget::new(&state.transport, state.snapshot.as_ref())
                    .block(Block::default().borders(Borders::ALL).title(" Metronome ")),
                chunks[0],
            );

            let fill = state.progress();
            frame.render_widget(
                ProgressWidget::new(&state.song, &fill)
                    .block(Block::default().borders(Borders::ALL).title(" Song ")),
                chunks[1],
            );

            render_parts(frame, chunks[2], &state);
            render_status_bar(frame, chunks[3], &state);

            if state.show_help {
                render_help_overlay(frame, area);
            }
        })?;

        Ok(())
    }

    fn cleanup(&mut self) -> io::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for App {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Map a key press to an action
pub fn key_action(code: KeyCode, modifiers: KeyModifiers) -> KeyAction {
    match (code, modifiers) {
        (KeyCode::Char('q'), KeyModifiers::NONE)
        | (KeyCode::Char('c'), KeyModifiers::CONTROL) => KeyAction::Quit,

        (KeyCode::Char(' '), KeyModifiers::NONE) => KeyAction::TogglePlay,
        (KeyCode::Esc, KeyModifiers::NONE) => KeyAction::Stop,

        (KeyCode::Up, KeyModifiers::NONE) | (KeyCode::Char('+'), _) => KeyAction::TempoUp,
        (KeyCode::Down, KeyModifiers::NONE) | (KeyCode::Char('-'), _) => KeyAction::TempoDown,

        (KeyCode::Right, KeyModifiers::NONE) | (KeyCode::Tab, KeyModifiers::NONE) => {
            KeyAction::NextProfile
        }
        (KeyCode::Left, KeyModifiers::NONE) | (KeyCode::BackTab, _) => KeyAction::PreviousProfile,

        (KeyCode::Char('?'), _) | (KeyCode::Char('h'), KeyModifiers::NONE) => KeyAction::ToggleHelp,

        _ => KeyAction::None,
    }
}

/// Render the part list with the current part highlighted
fn render_parts(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default().borders(Borders::ALL).title(" Parts ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let current = state.snapshot.as_ref().map(|s| s.part_index);
    let lines: Vec<Line> = state
        .song
        .parts()
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let marker = if current == Some(i) { "▶ " } else { "  " };
            let style = if current == Some(i) {
                Style::default().fg(part_color(&part.name)).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            Line::from(vec![
                Span::styled(marker, style),
                Span::styled(format!("{:<14}", part.name), style),
                Span::styled(
                    format!("{:>3} bars  ({:>3}-{:<3})", part.measures, part.start_measure, part.end_measure),
                    Style::default().fg(Color::DarkGray),
                ),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Render status bar
fn render_status_bar(frame: &mut Frame, area: Rect, state: &UiState) {
    let text = if let Some(ref msg) = state.status_message {
        Span::styled(msg.as_str(), Style::default().fg(Color::Yellow))
    } else if state.is_finished() {
        Span::styled(
            " Song complete. Space to play again",
            Style::default().fg(Color::Green),
        )
    } else {
        Span::styled(
            " Space: Play/Stop | Esc: Stop | Up/Down: Tempo | Left/Right: Profile | h: Help | q: Quit",
            Style::default().fg(Color::DarkGray),
        )
    };

    frame.render_widget(Paragraph::new(text), area);
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let width = 44.min(area.width.saturating_sub(4));
    let height = 12.min(area.height.saturating_sub(4));
    let x = (area.width - width) / 2;
    let y = (area.height - height) / 2;
    let help_area = Rect::new(x, y, width, height);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Help ")
        .style(Style::default().bg(Color::Black));

    let inner = block.inner(help_area);
    frame.render_widget(block, help_area);

    let help_text = vec![
        Line::from(Span::styled("Transport", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("  Space       Play/Stop"),
        Line::from("  Esc         Stop"),
        Line::from("  Up/Down     Tempo +/- 1 BPM"),
        Line::from(""),
        Line::from(Span::styled("Profiles", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("  Left/Right  Previous/next profile"),
        Line::from(""),
        Line::from("  h/?         Toggle help"),
        Line::from("  q/Ctrl+c    Quit"),
    ];

    frame.render_widget(Paragraph::new(help_text), inner);
}
