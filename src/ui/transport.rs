// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Transport display widget.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph, Widget},
};

use super::{DisplaySnapshot, TransportState};

/// Transport widget for displaying playback state and position
pub struct TransportWidget<'a> {
    state: &'a TransportState,
    snapshot: Option<&'a DisplaySnapshot>,
    block: Option<Block<'a>>,
}

impl<'a> TransportWidget<'a> {
    /// Create a new transport widget
    pub fn new(state: &'a TransportState, snapshot: Option<&'a DisplaySnapshot>) -> Self {
        Self {
            state,
            snapshot,
            block: None,
        }
    }

    /// Set the block wrapper
    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

impl Widget for TransportWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let area = if let Some(block) = self.block {
            let inner = block.inner(area);
            block.render(area, buf);
            inner
        } else {
            area
        };

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(0)])
            .split(area);

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(10), // Play/Stop indicator
                Constraint::Length(2),  // Spacer
                Constraint::Length(10), // Tempo
                Constraint::Length(2),  // Spacer
                Constraint::Length(6),  // Time signature
                Constraint::Length(2),  // Spacer
                Constraint::Min(0),     // Profile
            ])
            .split(rows[0]);

        let (indicator, style) = if self.state.playing {
            ("▶ PLAY", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        } else {
            ("■ STOP", Style::default().fg(Color::Yellow))
        };
        Paragraph::new(indicator).style(style).render(chunks[0], buf);

        Paragraph::new(format!("{} BPM", self.state.tempo))
            .style(Style::default().fg(Color::Magenta))
            .render(chunks[2], buf);

        Paragraph::new(format!(
            "{}/{}",
            self.state.beats_per_measure, self.state.beat_unit
        ))
        .style(Style::default().fg(Color::White))
        .render(chunks[4], buf);

        Paragraph::new(self.state.profile.as_str())
            .style(Style::default().fg(Color::DarkGray))
            .render(chunks[6], buf);

        position_line(self.snapshot).render(rows[1], buf);
    }
}

fn position_line(snapshot: Option<&DisplaySnapshot>) -> Paragraph<'static> {
    let Some(snapshot) = snapshot else {
        return Paragraph::new("--").style(Style::default().fg(Color::DarkGray));
    };

    let mut spans = vec![
        Span::styled(
            format!("{:<12}", snapshot.part_name),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            " {:>3}/{:<3} ",
            snapshot.measure_in_part, snapshot.measures_in_part
        )),
    ];
    spans.extend(BeatDots::new(snapshot.beat_in_measure, snapshot.beats_per_measure).spans());
    if let Some(next) = &snapshot.next_part_name {
        spans.push(Span::styled(
            format!("  next: {}", next),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Paragraph::new(Line::from(spans))
}

/// One dot per beat, the current beat lit
pub struct BeatDots {
    beat: u32,
    beats_per_measure: u32,
}

impl BeatDots {
    /// Create dots for a beat within a measure
    pub fn new(beat: u32, beats_per_measure: u32) -> Self {
        Self {
            beat,
            beats_per_measure,
        }
    }

    /// Styled spans, one per beat
    pub fn spans(&self) -> Vec<Span<'static>> {
        (1..=self.beats_per_measure)
            .map(|b| {
                let style = match (b == self.beat, b == 1) {
                    (true, true) => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    (true, false) => Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                    (false, _) => Style::default().fg(Color::DarkGray),
                };
                let glyph = if b == self.beat { "● " } else { "○ " };
                Span::styled(glyph, style)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_dots() {
        let spans = BeatDots::new(2, 4).spans();
        assert_eq!(spans.len(), 4);
        assert_eq!(spans[1].content, "● ");
        assert_eq!(spans[0].content, "○ ");
    }

    #[test]
    fn test_render_stopped() {
        let state = TransportState::default();
        let area = Rect::new(0, 0, 60, 2);
        let mut buf = Buffer::empty(area);
        TransportWidget::new(&state, None).render(area, &mut buf);

        let first_row: String = (0..area.width)
            .map(|x| buf[(x, 0)].symbol().to_string())
            .collect();
        assert!(first_row.contains("STOP"));
        assert!(first_row.contains("120 BPM"));
    }
}
