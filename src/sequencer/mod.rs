// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Sequencer core for scheduling clicks.
//!
//! This module provides the core sequencing infrastructure:
//! - Beat/measure/part position state machine
//! - Lookahead scheduler placing clicks on the audio clock
//! - Async driver waking the scheduler on a fixed period

pub mod driver;
pub mod position;
pub mod scheduler;

pub use driver::{SchedulerHandle, TransportCommand};
pub use position::{BeatPosition, Step};
pub use scheduler::{Pass, PlaybackState, Scheduler, SchedulerConfig};

/// Tempo and time signature of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatTiming {
    /// Tempo in BPM
    pub tempo: u32,
    /// Beats per measure (time signature numerator)
    pub beats_per_measure: u32,
    /// Beat unit (time signature denominator, 4 = quarter note)
    pub beat_unit: u32,
}

impl Default for BeatTiming {
    fn default() -> Self {
        Self {
            tempo: 120,
            beats_per_measure: 4,
            beat_unit: 4,
        }
    }
}

impl BeatTiming {
    /// Create timing from tempo and time signature
    pub fn new(tempo: u32, beats_per_measure: u32, beat_unit: u32) -> Self {
        Self {
            tempo,
            beats_per_measure,
            beat_unit,
        }
    }

    /// Duration of one beat in seconds, scaled by the beat unit
    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.tempo as f64 * (4.0 / self.beat_unit as f64)
    }

    /// Duration of one measure in seconds
    pub fn seconds_per_measure(&self) -> f64 {
        self.seconds_per_beat() * self.beats_per_measure as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_defaults() {
        let timing = BeatTiming::default();
        assert_eq!(timing.tempo, 120);
        assert_eq!(timing.beats_per_measure, 4);
        assert_eq!(timing.beat_unit, 4);
    }

    #[test]
    fn test_quarter_note_beat() {
        let timing = BeatTiming::new(120, 4, 4);
        assert_eq!(timing.seconds_per_beat(), 0.5);
        assert_eq!(timing.seconds_per_measure(), 2.0);
    }

    #[test]
    fn test_eighth_note_beat() {
        let timing = BeatTiming::new(120, 6, 8);
        assert_eq!(timing.seconds_per_beat(), 0.25);
        assert_eq!(timing.seconds_per_measure(), 1.5);
    }

    #[test]
    fn test_half_note_beat() {
        let timing = BeatTiming::new(60, 2, 2);
        assert_eq!(timing.seconds_per_beat(), 2.0);
    }

    #[test]
    fn test_fastest_beat() {
        let timing = BeatTiming::new(300, 4, 4);
        assert!((timing.seconds_per_beat() - 0.2).abs() < 1e-12);
    }
}
