// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Song snapshot for playback.
//!
//! A [`Song`] is the immutable, laid-out copy of the part list that the
//! scheduler works from for the duration of a run.

use std::fmt;

use super::part::{layout_parts, SongPart};
use crate::sequencer::BeatTiming;

/// Laid-out, read-only song structure
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    parts: Vec<SongPart>,
    total_measures: u32,
}

impl Song {
    /// Build a song from parts, recomputing the measure layout
    pub fn new(parts: &[SongPart]) -> Self {
        let parts = layout_parts(parts);
        let total_measures = parts.last().map(|p| p.end_measure).unwrap_or(0);
        Self {
            parts,
            total_measures,
        }
    }

    /// Get all parts
    pub fn parts(&self) -> &[SongPart] {
        &self.parts
    }

    /// Get a part by index
    pub fn part(&self, index: usize) -> Option<&SongPart> {
        self.parts.get(index)
    }

    /// Get the part following `index`, if any
    pub fn next_part(&self, index: usize) -> Option<&SongPart> {
        self.parts.get(index + 1)
    }

    /// Number of parts
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check if the song has no parts
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Total number of measures across all parts
    pub fn total_measures(&self) -> u32 {
        self.total_measures
    }

    /// Total number of beats for a given measure length
    pub fn total_beats(&self, beats_per_measure: u32) -> u64 {
        self.total_measures as u64 * beats_per_measure as u64
    }

    /// Find the part containing an absolute measure
    pub fn part_index_at(&self, measure: u32) -> Option<usize> {
        self.parts.iter().position(|p| p.contains(measure))
    }

    /// Playing time of the whole song
    pub fn length(&self, timing: &BeatTiming) -> SongLength {
        let beats = self.total_beats(timing.beats_per_measure);
        SongLength {
            measures: self.total_measures,
            seconds: beats as f64 * timing.seconds_per_beat(),
        }
    }
}

/// Length of a song in measures and seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SongLength {
    /// Total measures
    pub measures: u32,
    /// Total playing time in seconds
    pub seconds: f64,
}

impl SongLength {
    /// Whole minutes
    pub fn minutes(&self) -> u64 {
        (self.seconds / 60.0).floor() as u64
    }

    /// Whole seconds past the last full minute
    pub fn remainder_seconds(&self) -> u64 {
        (self.seconds % 60.0).floor() as u64
    }
}

impl fmt::Display for SongLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} measures ({} min {} sec)",
            self.measures,
            self.minutes(),
            self.remainder_seconds()
        )
    }
}
