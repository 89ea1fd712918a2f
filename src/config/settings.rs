// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Engine settings loaded from `metronome.toml`.
//!
//! These tune the scheduler and the audio output; they are not part of a
//! profile and do not change between songs.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::audio::AudioConfig;
use crate::sequencer::SchedulerConfig;
use crate::timing::MAX_TEMPO;

/// Default settings file name, looked up in the working directory
pub const SETTINGS_FILE: &str = "metronome.toml";

/// Scheduler and audio tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineSettings {
    /// How far ahead of the audio clock beats are dispatched
    #[serde(default = "default_lookahead_ms")]
    pub lookahead_ms: u32,
    /// Period of the scheduler wake-up timer
    #[serde(default = "default_wake_interval_ms")]
    pub wake_interval_ms: u32,
    /// Delay between start and the first beat
    #[serde(default = "default_lead_in_ms")]
    pub lead_in_ms: u32,
    /// Output sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Output buffer size in frames
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u32,
    /// Directory holding the built-in `accent.wav` and `normal.wav`
    #[serde(default = "default_sounds_dir")]
    pub sounds_dir: PathBuf,
}

fn default_lookahead_ms() -> u32 {
    250
}
fn default_wake_interval_ms() -> u32 {
    25
}
fn default_lead_in_ms() -> u32 {
    50
}
fn default_sample_rate() -> u32 {
    44100
}
fn default_buffer_size() -> u32 {
    512
}
fn default_sounds_dir() -> PathBuf {
    PathBuf::from("sounds")
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lookahead_ms: default_lookahead_ms(),
            wake_interval_ms: default_wake_interval_ms(),
            lead_in_ms: default_lead_in_ms(),
            sample_rate: default_sample_rate(),
            buffer_size: default_buffer_size(),
            sounds_dir: default_sounds_dir(),
        }
    }
}

impl EngineSettings {
    /// Load settings from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read settings file: {:?}", path.as_ref()))?;
        Self::from_toml(&contents)
    }

    /// Load settings if the file exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate settings from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let settings: Self = toml::from_str(contents).context("Failed to parse settings TOML")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).context("Failed to serialize settings to TOML")
    }

    /// Check the timing constraints the scheduler relies on.
    ///
    /// The wake-up period must be shorter than the fastest beat so no beat
    /// window is skipped. The lookahead must cover one wake-up plus one
    /// fastest beat, so a wake-up that stalls for up to a whole beat still
    /// dispatches its clicks before they are due.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fastest_beat_ms = 60_000 / MAX_TEMPO;
        if self.wake_interval_ms == 0 || self.wake_interval_ms >= fastest_beat_ms {
            return Err(ConfigError::InvalidConfig(format!(
                "wake interval must be between 1 and {} ms",
                fastest_beat_ms - 1
            )));
        }
        let min_lookahead_ms = self.wake_interval_ms + fastest_beat_ms;
        if self.lookahead_ms < min_lookahead_ms {
            return Err(ConfigError::InvalidConfig(format!(
                "lookahead ({} ms) must be at least the wake interval plus one beat at {} BPM ({} ms)",
                self.lookahead_ms, MAX_TEMPO, min_lookahead_ms
            )));
        }
        if self.sample_rate == 0 || self.buffer_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "sample rate and buffer size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Wake-up timer period
    pub fn wake_interval(&self) -> Duration {
        Duration::from_millis(self.wake_interval_ms as u64)
    }

    /// Scheduler tuning derived from these settings
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            lookahead_ms: self.lookahead_ms,
            lead_in_ms: self.lead_in_ms,
        }
    }

    /// Audio output configuration derived from these settings
    pub fn audio_config(&self) -> AudioConfig {
        AudioConfig {
            sample_rate: self.sample_rate,
            buffer_size: self.buffer_size,
            ..AudioConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let settings = EngineSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.wake_interval(), Duration::from_millis(25));
        assert_eq!(settings.scheduler_config().lookahead_ms, 250);
    }

    #[test]
    fn test_partial_toml() {
        let settings = EngineSettings::from_toml("lookahead_ms = 300\nsample_rate = 48000\n").unwrap();
        assert_eq!(settings.lookahead_ms, 300);
        assert_eq!(settings.sample_rate, 48000);
        assert_eq!(settings.wake_interval_ms, 25);
        assert_eq!(settings.audio_config().sample_rate, 48000);
    }

    #[test]
    fn test_wake_interval_must_beat_fastest_tempo() {
        // 300 BPM is a 200ms beat
        assert!(EngineSettings::from_toml("wake_interval_ms = 200\nlookahead_ms = 400").is_err());
        assert!(EngineSettings::from_toml("wake_interval_ms = 0").is_err());
        assert!(EngineSettings::from_toml("wake_interval_ms = 199\nlookahead_ms = 400").is_ok());
    }

    #[test]
    fn test_lookahead_must_cover_wake_and_fastest_beat() {
        // 50ms wake-up plus a 200ms beat
        assert!(EngineSettings::from_toml("wake_interval_ms = 50\nlookahead_ms = 249").is_err());
        assert!(EngineSettings::from_toml("wake_interval_ms = 50\nlookahead_ms = 250").is_ok());

        // 100ms is too short next to the 25ms default wake-up
        let short = EngineSettings {
            lookahead_ms: 100,
            ..Default::default()
        };
        assert!(matches!(short.validate(), Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_or_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);

        let settings = EngineSettings::load_or_default(&path).unwrap();
        assert_eq!(settings, EngineSettings::default());

        let custom = EngineSettings {
            lead_in_ms: 80,
            ..Default::default()
        };
        fs::write(&path, custom.to_toml().unwrap()).unwrap();
        assert_eq!(EngineSettings::load_or_default(&path).unwrap(), custom);
    }
}
