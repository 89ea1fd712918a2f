// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration system for the metronome.
//!
//! This module provides the playback configuration the scheduler reads at
//! start, the named profile store it is persisted in, engine settings, and
//! a file watcher for hot reload.

pub mod profiles;
pub mod settings;
pub mod watcher;

pub use profiles::ProfileStore;
pub use settings::EngineSettings;
pub use watcher::{validate_profiles, ConfigEvent, ConfigWatcher};

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::arrangement::{default_song_parts, layout_parts, measure_total, SongPart};
use crate::sequencer::BeatTiming;
use crate::timing::{MAX_TEMPO, MIN_TEMPO};

/// Longest song, in measures, the position counter can step past
pub const MAX_SONG_MEASURES: u32 = u32::MAX - 1;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration cannot be played or used
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// A file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A file could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Which sound a voice plays
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SoundSelector {
    /// Synthesized tone
    #[default]
    Generated,
    /// Bundled sample from the sounds directory
    Builtin,
    /// User-supplied sample file
    Custom,
}

impl fmt::Display for SoundSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SoundSelector::Generated => "generated",
            SoundSelector::Builtin => "builtin",
            SoundSelector::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// Settings for one click voice (accent or normal)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VoiceConfig {
    /// Sound source for this voice
    #[serde(default)]
    pub sound: SoundSelector,
    /// Timing offset in seconds applied to the sound only (may be negative)
    #[serde(default)]
    pub offset: f64,
    /// Sample file used when `sound` is `custom`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl VoiceConfig {
    /// Voice with a given sound and no offset
    pub fn with_sound(sound: SoundSelector) -> Self {
        Self {
            sound,
            ..Default::default()
        }
    }
}

/// Everything the scheduler needs to play a song
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackConfig {
    /// Tempo in BPM
    #[serde(default = "default_tempo")]
    pub tempo: u32,
    /// Time signature numerator
    #[serde(default = "default_beats_per_measure")]
    pub beats_per_measure: u32,
    /// Time signature denominator
    #[serde(default = "default_beat_unit")]
    pub beat_unit: u32,
    /// Ordered song structure
    #[serde(default)]
    pub song_parts: Vec<SongPart>,
    /// Voice for the first beat of each measure
    #[serde(default)]
    pub accent: VoiceConfig,
    /// Voice for every other beat
    #[serde(default)]
    pub normal: VoiceConfig,
}

fn default_tempo() -> u32 {
    120
}
fn default_beats_per_measure() -> u32 {
    4
}
fn default_beat_unit() -> u32 {
    4
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tempo: default_tempo(),
            beats_per_measure: default_beats_per_measure(),
            beat_unit: default_beat_unit(),
            song_parts: default_song_parts(),
            accent: VoiceConfig::default(),
            normal: VoiceConfig::default(),
        }
    }
}

impl PlaybackConfig {
    /// Check that the configuration can be played
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_TEMPO..=MAX_TEMPO).contains(&self.tempo) {
            return Err(ConfigError::InvalidConfig(format!(
                "tempo {} is outside {}-{} BPM",
                self.tempo, MIN_TEMPO, MAX_TEMPO
            )));
        }
        if self.beats_per_measure == 0 {
            return Err(ConfigError::InvalidConfig(
                "beats per measure must be positive".to_string(),
            ));
        }
        if self.beat_unit == 0 {
            return Err(ConfigError::InvalidConfig(
                "beat unit must be positive".to_string(),
            ));
        }
        if self.song_parts.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "at least one song part is required".to_string(),
            ));
        }
        if let Some(part) = self.song_parts.iter().find(|p| p.measures == 0) {
            return Err(ConfigError::InvalidConfig(format!(
                "song part '{}' has no measures",
                part.name
            )));
        }
        self.check_song_length()?;
        for (label, voice) in [("accent", &self.accent), ("normal", &self.normal)] {
            if !voice.offset.is_finite() {
                return Err(ConfigError::InvalidConfig(format!(
                    "{} offset must be a finite number of seconds",
                    label
                )));
            }
        }
        Ok(())
    }

    /// Check that the part lengths add up to a song the counter can play
    pub fn check_song_length(&self) -> Result<(), ConfigError> {
        let total = measure_total(&self.song_parts);
        if total > MAX_SONG_MEASURES as u64 {
            return Err(ConfigError::InvalidConfig(format!(
                "song has {} measures, the limit is {}",
                total, MAX_SONG_MEASURES
            )));
        }
        Ok(())
    }

    /// Beat timing derived from tempo and time signature
    pub fn timing(&self) -> BeatTiming {
        BeatTiming::new(self.tempo, self.beats_per_measure, self.beat_unit)
    }

    /// Get time signature
    pub fn time_signature(&self) -> TimeSignature {
        TimeSignature {
            beats_per_measure: self.beats_per_measure,
            beat_unit: self.beat_unit,
        }
    }

    /// Set time signature
    pub fn set_time_signature(&mut self, signature: TimeSignature) {
        self.beats_per_measure = signature.beats_per_measure;
        self.beat_unit = signature.beat_unit;
    }

    /// Voice settings for accented or normal beats
    pub fn voice(&self, accent: bool) -> &VoiceConfig {
        if accent {
            &self.accent
        } else {
            &self.normal
        }
    }

    /// Recompute the measure layout of the song parts
    pub fn relayout(&mut self) {
        self.song_parts = layout_parts(&self.song_parts);
    }

    /// Append a part at the end of the song
    pub fn add_part(&mut self, name: impl Into<String>, measures: u32) {
        self.song_parts.push(SongPart::new(name, measures));
        self.relayout();
    }

    /// Remove a part by index
    pub fn remove_part(&mut self, index: usize) -> Option<SongPart> {
        if index >= self.song_parts.len() {
            return None;
        }
        let removed = self.song_parts.remove(index);
        self.relayout();
        Some(removed)
    }

    /// Rename a part; returns false if the index is out of range
    pub fn rename_part(&mut self, index: usize, name: impl Into<String>) -> bool {
        match self.song_parts.get_mut(index) {
            Some(part) => {
                part.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Change the length of a part; zero-length parts are refused
    pub fn set_part_measures(&mut self, index: usize, measures: u32) -> Result<(), ConfigError> {
        if measures == 0 {
            return Err(ConfigError::InvalidConfig(
                "a song part needs at least one measure".to_string(),
            ));
        }
        let part = self.song_parts.get_mut(index).ok_or_else(|| {
            ConfigError::InvalidConfig(format!("no song part at index {}", index))
        })?;
        part.measures = measures;
        self.relayout();
        Ok(())
    }

    /// Replace the song structure with the default one
    pub fn reset_song_parts(&mut self) {
        self.song_parts = default_song_parts();
    }
}

/// Time signature such as 4/4 or 7/8
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    /// Beats per measure
    pub beats_per_measure: u32,
    /// Note value of one beat
    pub beat_unit: u32,
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats_per_measure, self.beat_unit)
    }
}

impl FromStr for TimeSignature {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, den) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| ConfigError::Parse(format!("expected N/D time signature, got '{}'", s)))?;
        let beats_per_measure: u32 = num
            .trim()
            .parse()
            .map_err(|_| ConfigError::Parse(format!("invalid beat count in '{}'", s)))?;
        let beat_unit: u32 = den
            .trim()
            .parse()
            .map_err(|_| ConfigError::Parse(format!("invalid beat unit in '{}'", s)))?;
        if beats_per_measure == 0 || beat_unit == 0 {
            return Err(ConfigError::InvalidConfig(format!(
                "time signature '{}' must be positive",
                s
            )));
        }
        Ok(Self {
            beats_per_measure,
            beat_unit,
        })
    }
}
