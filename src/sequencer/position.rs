// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Beat/measure/part position state machine.
//!
//! Pure counter logic: given the same song and the same number of
//! [`BeatPosition::advance`] calls it always lands on the same position,
//! so it can be tested without any clock or audio device.

use crate::arrangement::Song;

/// What an `advance` call crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Next beat of the same measure
    Beat,
    /// First beat of a new measure in the same part
    Measure,
    /// First beat of a new part
    Part,
    /// Past the last measure; nothing more to play
    SongComplete,
}

/// Position within the song
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatPosition {
    /// Index of the current part (`== parts.len()` when complete)
    pub part_index: usize,
    /// Absolute measure in the song (1-based)
    pub measure: u32,
    /// Beat within the measure (1-based)
    pub beat: u32,
}

impl Default for BeatPosition {
    fn default() -> Self {
        Self::start()
    }
}

impl BeatPosition {
    /// First beat of the first measure of the first part
    pub fn start() -> Self {
        Self {
            part_index: 0,
            measure: 1,
            beat: 1,
        }
    }

    /// First beat of each measure is accented
    pub fn is_accent(&self) -> bool {
        self.beat == 1
    }

    /// Check if the song has been played through
    pub fn is_complete(&self, song: &Song) -> bool {
        self.part_index >= song.len()
    }

    /// Measure within the current part (1-based)
    pub fn measure_in_part(&self, song: &Song) -> Option<u32> {
        song.part(self.part_index)
            .map(|part| part.local_measure(self.measure))
    }

    /// Move to the next beat
    pub fn advance(&mut self, song: &Song, beats_per_measure: u32) -> Step {
        if self.is_complete(song) {
            return Step::SongComplete;
        }

        self.beat += 1;
        if self.beat <= beats_per_measure {
            return Step::Beat;
        }

        self.beat = 1;
        self.measure += 1;

        let end_measure = song
            .part(self.part_index)
            .map(|part| part.end_measure)
            .unwrap_or(0);
        if self.measure <= end_measure {
            return Step::Measure;
        }

        self.part_index += 1;
        if self.is_complete(song) {
            Step::SongComplete
        } else {
            Step::Part
        }
    }

    /// Format position as part:measure.beat
    pub fn format(&self) -> String {
        format!("P{}:{:03}.{}", self.part_index + 1, self.measure, self.beat)
    }
}
