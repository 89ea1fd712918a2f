// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Segmented song progress bar.
//!
//! One segment per part, sized by its share of the song's measures.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Widget},
};

use crate::arrangement::Song;

/// Segment color for a part, keyed on the first word of its name
pub fn part_color(name: &str) -> Color {
    match name.split_whitespace().next().unwrap_or("") {
        "Pre-count" => Color::LightRed,
        "Intro" => Color::LightGreen,
        "Verse" => Color::LightBlue,
        "Chorus" => Color::LightYellow,
        "Bridge" => Color::LightMagenta,
        "Outro" => Color::Gray,
        _ => Color::White,
    }
}

/// Split `width` cells between parts in proportion to their measures
pub fn segment_widths(song: &Song, width: u16) -> Vec<u16> {
    let total = song.total_measures().max(1) as u64;
    let mut used = 0u64;
    let mut measures = 0u64;

    song.parts()
        .iter()
        .map(|part| {
            // Cumulative rounding so the segments always add up to the width
            measures += part.measures as u64;
            let end = measures * width as u64 / total;
            let cells = end - used;
            used = end;
            cells as u16
        })
        .collect()
}

/// Progress bar over the parts of a song
pub struct ProgressWidget<'a> {
    song: &'a Song,
    fill: &'a [f64],
    block: Option<Block<'a>>,
}

impl<'a> ProgressWidget<'a> {
    /// Create a progress bar with per-part fill levels
    pub fn new(song: &'a Song, fill: &'a [f64]) -> Self {
        Self {
            song,
            fill,
            block: None,
        }
    }

    /// Set the block wrapper
    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

impl Widget for ProgressWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let area = if let Some(block) = self.block {
            let inner = block.inner(area);
            block.render(area, buf);
            inner
        } else {
            area
        };
        if area.width == 0 || area.height == 0 {
            return;
        }

        let mut x = area.x;
        for (i, (part, cells)) in self
            .song
            .parts()
            .iter()
            .zip(segment_widths(self.song, area.width))
            .enumerate()
        {
            let fill = self.fill.get(i).copied().unwrap_or(0.0).clamp(0.0, 1.0);
            let filled = (fill * cells as f64).round() as u16;
            let color = part_color(&part.name);

            for offset in 0..cells {
                let (symbol, style) = if offset < filled {
                    ("█", Style::default().fg(color))
                } else {
                    ("░", Style::default().fg(Color::DarkGray))
                };
                for y in area.y..area.y + area.height {
                    buf[(x + offset, y)].set_symbol(symbol).set_style(style);
                }
            }
            x += cells;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrangement::{default_song_parts, SongPart};

    #[test]
    fn test_part_colors() {
        assert_eq!(part_color("Verse 2"), Color::LightBlue);
        assert_eq!(part_color("Chorus"), Color::LightYellow);
        assert_eq!(part_color("Solo"), Color::White);
    }

    #[test]
    fn test_segment_widths_sum() {
        let song = Song::new(&default_song_parts());
        for width in [7u16, 40, 41, 80, 123] {
            let widths = segment_widths(&song, width);
            assert_eq!(widths.len(), 7);
            assert_eq!(widths.iter().sum::<u16>(), width);
        }
    }

    #[test]
    fn test_render_fill() {
        let song = Song::new(&[SongPart::new("Intro", 1), SongPart::new("Verse", 1)]);
        let fill = [1.0, 0.0];
        let area = Rect::new(0, 0, 10, 1);
        let mut buf = Buffer::empty(area);
        ProgressWidget::new(&song, &fill).render(area, &mut buf);

        assert_eq!(buf[(0, 0)].symbol(), "█");
        assert_eq!(buf[(4, 0)].symbol(), "█");
        assert_eq!(buf[(5, 0)].symbol(), "░");
    }
}
