// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Display model derived from the scheduler's position.

use std::collections::VecDeque;

use crate::arrangement::Song;
use crate::sequencer::BeatPosition;

/// What the display shows for one beat
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySnapshot {
    /// Index of the current part
    pub part_index: usize,
    /// Name of the current part
    pub part_name: String,
    /// Absolute measure in the song (1-based)
    pub measure: u32,
    /// Measure within the current part (1-based)
    pub measure_in_part: u32,
    /// Length of the current part
    pub measures_in_part: u32,
    /// Beat within the measure (1-based)
    pub beat_in_measure: u32,
    /// Beats per measure
    pub beats_per_measure: u32,
    /// Name of the following part, if any
    pub next_part_name: Option<String>,
    /// Share of the song's beats played before this one
    pub fraction_of_song_complete: f64,
    /// Whether this beat is accented
    pub is_accent: bool,
}

/// A snapshot due on the display at an audio-clock time
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayEvent {
    /// Audio-clock time the beat lands on
    pub at: f64,
    /// What to show
    pub snapshot: DisplaySnapshot,
}

/// Receives display updates from the scheduler.
///
/// Called from inside a scheduling pass, so implementations should only
/// record the update and return.
pub trait DisplaySink {
    /// A beat has been scheduled; show `event.snapshot` at `event.at`
    fn update_display(&mut self, event: DisplayEvent);

    /// Absolute measure of the beat just scheduled.
    ///
    /// This runs up to a lookahead ahead of what is heard. Sinks that show
    /// snapshots on the audio clock should draw progress from the released
    /// snapshot and treat this as the scheduling front.
    fn update_progress(&mut self, measure: u32);

    /// Playback stopped; reset the display
    fn clear(&mut self);

    /// The last beat of the song has been scheduled
    fn song_complete(&mut self);
}

/// Project a position onto a display snapshot; `None` once the song is over
pub fn project(position: &BeatPosition, song: &Song, beats_per_measure: u32) -> Option<DisplaySnapshot> {
    let part = song.part(position.part_index)?;

    let total = song.total_beats(beats_per_measure);
    let elapsed = position.measure.saturating_sub(1) as u64 * beats_per_measure as u64
        + position.beat.saturating_sub(1) as u64;
    let fraction = if total == 0 {
        1.0
    } else {
        (elapsed as f64 / total as f64).min(1.0)
    };

    Some(DisplaySnapshot {
        part_index: position.part_index,
        part_name: part.name.clone(),
        measure: position.measure,
        measure_in_part: part.local_measure(position.measure),
        measures_in_part: part.measures,
        beat_in_measure: position.beat,
        beats_per_measure,
        next_part_name: song.next_part(position.part_index).map(|p| p.name.clone()),
        fraction_of_song_complete: fraction,
        is_accent: position.is_accent(),
    })
}

/// Fill level of each part's progress segment at an absolute measure.
///
/// Parts already played are full, the current part is filled up to and
/// including the current measure, later parts are empty.
pub fn part_fill(song: &Song, measure: u32) -> Vec<f64> {
    song.parts()
        .iter()
        .map(|part| {
            if measure > part.end_measure {
                1.0
            } else if measure >= part.start_measure {
                part.local_measure(measure) as f64 / part.measures.max(1) as f64
            } else {
                0.0
            }
        })
        .collect()
}

/// Display events waiting for the audio clock to reach them
#[derive(Debug, Clone, Default)]
pub struct DisplayTimeline {
    pending: VecDeque<DisplayEvent>,
}

impl DisplayTimeline {
    /// Create an empty timeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event, keeping the queue ordered by time
    pub fn push(&mut self, event: DisplayEvent) {
        match self.pending.back() {
            Some(last) if last.at > event.at => {
                let index = self.pending.partition_point(|e| e.at <= event.at);
                self.pending.insert(index, event);
            }
            _ => self.pending.push_back(event),
        }
    }

    /// Pop every event due by `now` and return the latest snapshot among them
    pub fn release(&mut self, now: f64) -> Option<DisplaySnapshot> {
        let mut latest = None;
        while self.pending.front().is_some_and(|e| e.at <= now) {
            latest = self.pending.pop_front().map(|e| e.snapshot);
        }
        latest
    }

    /// Time of the next pending event
    pub fn next_at(&self) -> Option<f64> {
        self.pending.front().map(|e| e.at)
    }

    /// Drop all pending events
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Number of pending events
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrangement::SongPart;

    fn intro_verse() -> Song {
        Song::new(&[SongPart::new("Intro", 2), SongPart::new("Verse", 3)])
    }

    fn event(at: f64, beat: u32) -> DisplayEvent {
        let position = BeatPosition {
            part_index: 0,
            measure: 1,
            beat,
        };
        DisplayEvent {
            at,
            snapshot: project(&position, &intro_verse(), 4).unwrap(),
        }
    }

    #[test]
    fn test_project_first_beat() {
        let song = intro_verse();
        let snapshot = project(&BeatPosition::start(), &song, 4).unwrap();

        assert_eq!(snapshot.part_name, "Intro");
        assert_eq!(snapshot.measure_in_part, 1);
        assert_eq!(snapshot.measures_in_part, 2);
        assert_eq!(snapshot.beat_in_measure, 1);
        assert_eq!(snapshot.next_part_name.as_deref(), Some("Verse"));
        assert_eq!(snapshot.fraction_of_song_complete, 0.0);
        assert!(snapshot.is_accent);
    }

    #[test]
    fn test_project_last_part() {
        let song = intro_verse();
        let position = BeatPosition {
            part_index: 1,
            measure: 5,
            beat: 4,
        };
        let snapshot = project(&position, &song, 4).unwrap();

        assert_eq!(snapshot.part_name, "Verse");
        assert_eq!(snapshot.measure_in_part, 3);
        assert_eq!(snapshot.next_part_name, None);
        assert!(!snapshot.is_accent);
        // 19 of 20 beats played
        assert!((snapshot.fraction_of_song_complete - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_project_terminal_is_none() {
        let song = intro_verse();
        let position = BeatPosition {
            part_index: 2,
            measure: 6,
            beat: 1,
        };
        assert!(project(&position, &song, 4).is_none());
    }

    #[test]
    fn test_project_is_idempotent() {
        let song = intro_verse();
        let position = BeatPosition {
            part_index: 1,
            measure: 4,
            beat: 2,
        };
        assert_eq!(project(&position, &song, 4), project(&position, &song, 4));
    }

    #[test]
    fn test_part_fill() {
        let song = intro_verse();
        assert_eq!(part_fill(&song, 0), vec![0.0, 0.0]);
        assert_eq!(part_fill(&song, 1), vec![0.5, 0.0]);
        assert_eq!(part_fill(&song, 2), vec![1.0, 0.0]);

        let fill = part_fill(&song, 4);
        assert_eq!(fill[0], 1.0);
        assert!((fill[1] - 2.0 / 3.0).abs() < 1e-12);

        assert_eq!(part_fill(&song, 6), vec![1.0, 1.0]);
    }

    #[test]
    fn test_timeline_releases_due_events() {
        let mut timeline = DisplayTimeline::new();
        timeline.push(event(1.0, 1));
        timeline.push(event(1.5, 2));
        timeline.push(event(2.0, 3));

        assert!(timeline.release(0.9).is_none());
        assert_eq!(timeline.release(1.0).map(|s| s.beat_in_measure), Some(1));

        // A late frame skips straight to the newest due beat
        assert_eq!(timeline.release(2.2).map(|s| s.beat_in_measure), Some(3));
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_timeline_orders_events() {
        let mut timeline = DisplayTimeline::new();
        timeline.push(event(2.0, 3));
        timeline.push(event(1.0, 1));
        timeline.push(event(1.5, 2));

        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline.next_at(), Some(1.0));
        assert_eq!(timeline.release(1.6).map(|s| s.beat_in_measure), Some(2));

        timeline.clear();
        assert!(timeline.next_at().is_none());
    }
}
