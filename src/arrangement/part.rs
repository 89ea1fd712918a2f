// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Song parts and their measure layout.
//!
//! A part is a named, contiguous run of measures (Intro, Verse, ...).
//! The absolute start/end measures are never edited by hand: they are
//! derived from the ordered list of measure counts by [`layout_parts`].

use serde::{Deserialize, Serialize};

/// A named section of the song spanning a number of measures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SongPart {
    /// Display name
    pub name: String,
    /// Number of measures in this part
    pub measures: u32,
    /// First absolute measure of the part (1-based)
    #[serde(default)]
    pub start_measure: u32,
    /// Last absolute measure of the part (inclusive)
    #[serde(default)]
    pub end_measure: u32,
}

impl SongPart {
    /// Create a part that has not been laid out yet
    pub fn new(name: impl Into<String>, measures: u32) -> Self {
        Self {
            name: name.into(),
            measures,
            start_measure: 0,
            end_measure: 0,
        }
    }

    /// Get part name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of measures
    pub fn measure_count(&self) -> u32 {
        self.measures
    }

    /// Check whether an absolute measure falls inside this part
    pub fn contains(&self, measure: u32) -> bool {
        measure >= self.start_measure && measure <= self.end_measure
    }

    /// Convert an absolute measure to a 1-based measure within this part
    pub fn local_measure(&self, measure: u32) -> u32 {
        measure.saturating_sub(self.start_measure) + 1
    }
}

/// Recompute start/end measures for an ordered list of parts.
///
/// This is a fold over the measure counts: the first part starts at
/// measure 1 and each following part starts right after the previous one
/// ends. The input is never patched in place, so applying the layout to
/// its own output yields the same list.
pub fn layout_parts(parts: &[SongPart]) -> Vec<SongPart> {
    parts
        .iter()
        .scan(0u32, |last_measure, part| {
            let start_measure = last_measure.saturating_add(1);
            let end_measure = last_measure.saturating_add(part.measures);
            *last_measure = end_measure;
            Some(SongPart {
                name: part.name.clone(),
                measures: part.measures,
                start_measure,
                end_measure,
            })
        })
        .collect()
}

/// Sum of the part lengths, wide enough not to overflow
pub fn measure_total(parts: &[SongPart]) -> u64 {
    parts.iter().map(|part| part.measures as u64).sum()
}

/// Check the contiguity invariant without recomputing anything
pub fn is_laid_out(parts: &[SongPart]) -> bool {
    let mut expected_start = 1u64;
    for part in parts {
        let (start, end) = (part.start_measure as u64, part.end_measure as u64);
        if start != expected_start || end + 1 != start + part.measures as u64 {
            return false;
        }
        expected_start = end + 1;
    }
    true
}

/// The structure a fresh profile starts with
pub fn default_song_parts() -> Vec<SongPart> {
    layout_parts(&[
        SongPart::new("Pre-count", 1),
        SongPart::new("Intro", 4),
        SongPart::new("Verse 1", 8),
        SongPart::new("Chorus 1", 8),
        SongPart::new("Verse 2", 8),
        SongPart::new("Chorus 2", 8),
        SongPart::new("Outro", 4),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(counts: &[(&str, u32)]) -> Vec<SongPart> {
        counts
            .iter()
            .map(|(name, measures)| SongPart::new(*name, *measures))
            .collect()
    }

    #[test]
    fn test_layout_contiguous() {
        let laid = layout_parts(&parts(&[("Intro", 2), ("Verse", 3), ("Outro", 1)]));

        assert_eq!((laid[0].start_measure, laid[0].end_measure), (1, 2));
        assert_eq!((laid[1].start_measure, laid[1].end_measure), (3, 5));
        assert_eq!((laid[2].start_measure, laid[2].end_measure), (6, 6));
        assert!(is_laid_out(&laid));
    }

    #[test]
    fn test_layout_idempotent() {
        let once = layout_parts(&parts(&[("A", 4), ("B", 8), ("C", 1), ("D", 16)]));
        let twice = layout_parts(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_layout_ignores_stale_bounds() {
        let mut stale = parts(&[("Intro", 2), ("Verse", 3)]);
        stale[0].start_measure = 7;
        stale[0].end_measure = 99;
        stale[1].start_measure = 42;
        assert!(!is_laid_out(&stale));

        let laid = layout_parts(&stale);
        assert_eq!(laid, layout_parts(&parts(&[("Intro", 2), ("Verse", 3)])));
    }

    #[test]
    fn test_measure_count_matches_bounds() {
        for part in default_song_parts() {
            assert_eq!(part.end_measure - part.start_measure + 1, part.measure_count());
        }
    }

    #[test]
    fn test_default_structure() {
        let parts = default_song_parts();
        assert_eq!(parts.len(), 7);
        assert_eq!(parts[0].name(), "Pre-count");
        assert_eq!(parts.last().map(|p| p.end_measure), Some(41));
    }

    #[test]
    fn test_local_measure() {
        let laid = layout_parts(&parts(&[("Intro", 2), ("Verse", 3)]));
        assert!(laid[1].contains(3));
        assert!(!laid[1].contains(2));
        assert_eq!(laid[1].local_measure(3), 1);
        assert_eq!(laid[1].local_measure(5), 3);
    }

    #[test]
    fn test_layout_saturates_on_huge_parts() {
        let huge = parts(&[("A", u32::MAX), ("B", 1)]);
        let laid = layout_parts(&huge);

        assert_eq!(laid[0].end_measure, u32::MAX);
        assert_eq!(laid[1].start_measure, u32::MAX);
        assert_eq!(laid[1].end_measure, u32::MAX);
        assert!(!is_laid_out(&laid));
        assert_eq!(measure_total(&huge), u32::MAX as u64 + 1);
    }

    #[test]
    fn test_empty_layout() {
        assert!(layout_parts(&[]).is_empty());
        assert!(is_laid_out(&[]));
    }
}
