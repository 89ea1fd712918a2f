// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Click sounds.
//!
//! Every voice always has a generated tone. Sample files are optional;
//! if one is missing or cannot be decoded, that voice plays its tone.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use super::AudioError;
use crate::config::{PlaybackConfig, SoundSelector, VoiceConfig};

/// Accent tone frequency in Hz
pub const ACCENT_FREQ: f32 = 1000.0;

/// Normal tone frequency in Hz
pub const NORMAL_FREQ: f32 = 800.0;

/// Length of a generated click in seconds
pub const CLICK_SECONDS: f32 = 0.05;

/// Built-in sample file names inside the sounds directory
pub const BUILTIN_ACCENT: &str = "accent.wav";
pub const BUILTIN_NORMAL: &str = "normal.wav";

/// Mono sample buffer shared with the render thread
pub type Samples = Arc<[f32]>;

/// Sounds available to one voice
#[derive(Debug, Clone)]
pub struct VoiceSamples {
    generated: Samples,
    builtin: Option<Samples>,
    custom: Option<Samples>,
}

impl VoiceSamples {
    fn tone(freq: f32, sample_rate: u32) -> Self {
        Self {
            generated: generate_tone(freq, CLICK_SECONDS, sample_rate).into(),
            builtin: None,
            custom: None,
        }
    }

    /// Buffer for a selector, falling back to the generated tone
    pub fn get(&self, sound: SoundSelector) -> &Samples {
        let chosen = match sound {
            SoundSelector::Generated => None,
            SoundSelector::Builtin => self.builtin.as_ref(),
            SoundSelector::Custom => self.custom.as_ref(),
        };
        chosen.unwrap_or(&self.generated)
    }

    fn is_shared(&self) -> bool {
        [Some(&self.generated), self.builtin.as_ref(), self.custom.as_ref()]
            .into_iter()
            .flatten()
            .any(|samples| Arc::strong_count(samples) > 1)
    }

    /// Check whether a selector resolves to its own buffer
    pub fn has(&self, sound: SoundSelector) -> bool {
        match sound {
            SoundSelector::Generated => true,
            SoundSelector::Builtin => self.builtin.is_some(),
            SoundSelector::Custom => self.custom.is_some(),
        }
    }
}

/// Decoded click sounds for the accent and normal voices
#[derive(Debug, Clone)]
pub struct SoundBank {
    accent: VoiceSamples,
    normal: VoiceSamples,
    sample_rate: u32,
}

impl SoundBank {
    /// Bank with only generated tones
    pub fn generated(sample_rate: u32) -> Self {
        Self {
            accent: VoiceSamples::tone(ACCENT_FREQ, sample_rate),
            normal: VoiceSamples::tone(NORMAL_FREQ, sample_rate),
            sample_rate,
        }
    }

    /// Load the built-in samples and the custom files a profile names.
    ///
    /// Never fails: anything that cannot be loaded is logged and the
    /// voice keeps its generated tone.
    pub fn load(sample_rate: u32, sounds_dir: &Path, config: &PlaybackConfig) -> Self {
        let mut bank = Self::generated(sample_rate);

        bank.accent.builtin = load_optional(&sounds_dir.join(BUILTIN_ACCENT), sample_rate);
        bank.normal.builtin = load_optional(&sounds_dir.join(BUILTIN_NORMAL), sample_rate);
        bank.accent.custom = load_custom(&config.accent, "accent", sample_rate);
        bank.normal.custom = load_custom(&config.normal, "normal", sample_rate);

        for (label, voice, samples) in [
            ("accent", &config.accent, &bank.accent),
            ("normal", &config.normal, &bank.normal),
        ] {
            if !samples.has(voice.sound) {
                warn!(voice = label, sound = %voice.sound, "sound unavailable, using generated tone");
            }
        }
        bank
    }

    /// Buffer to play for a click
    pub fn sample(&self, accent: bool, sound: SoundSelector) -> Samples {
        let voice = if accent { &self.accent } else { &self.normal };
        Arc::clone(voice.get(sound))
    }

    /// Whether a queued or sounding click still holds one of the buffers
    pub fn is_shared(&self) -> bool {
        self.accent.is_shared() || self.normal.is_shared()
    }

    /// Samples for one voice
    pub fn voice(&self, accent: bool) -> &VoiceSamples {
        if accent {
            &self.accent
        } else {
            &self.normal
        }
    }

    /// Get sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn load_optional(path: &Path, sample_rate: u32) -> Option<Samples> {
    if !path.exists() {
        debug!(path = ?path, "no sample file");
        return None;
    }
    match decode_wav(path, sample_rate) {
        Ok(samples) => Some(samples.into()),
        Err(e) => {
            warn!(path = ?path, error = %e, "failed to load sample");
            None
        }
    }
}

fn load_custom(voice: &VoiceConfig, label: &str, sample_rate: u32) -> Option<Samples> {
    match &voice.file {
        Some(path) => load_optional(path, sample_rate),
        None => {
            if voice.sound == SoundSelector::Custom {
                warn!(voice = label, "custom sound selected but no file configured");
            }
            None
        }
    }
}

/// Sine tone with a short fade-out so it does not pop
pub fn generate_tone(freq: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
    let len = (seconds * sample_rate as f32).round() as usize;
    let fade = (sample_rate as usize / 200).min(len);
    let step = std::f32::consts::TAU * freq / sample_rate as f32;

    (0..len)
        .map(|i| {
            let remaining = len - i;
            let gain = if remaining < fade {
                remaining as f32 / fade as f32
            } else {
                1.0
            };
            (i as f32 * step).sin() * gain * 0.8
        })
        .collect()
}

/// Decode a WAV file to mono at the given sample rate
pub fn decode_wav(path: &Path, sample_rate: u32) -> Result<Vec<f32>, AudioError> {
    let file = File::open(path)
        .map_err(|e| AudioError::Decode(format!("Failed to open {:?}: {}", path, e)))?;
    let reader = hound::WavReader::new(BufReader::new(file))
        .map_err(|e| AudioError::Decode(format!("Failed to parse {:?}: {}", path, e)))?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| AudioError::Decode(format!("Corrupt samples in {:?}: {}", path, e)))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| AudioError::Decode(format!("Corrupt samples in {:?}: {}", path, e)))?
        }
    };

    if interleaved.is_empty() {
        return Err(AudioError::Decode(format!("{:?} contains no audio", path)));
    }

    let mono = mix_to_mono(&interleaved, channels);
    Ok(resample(&mono, spec.sample_rate, sample_rate))
}

fn mix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler
pub fn resample(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || from == 0 || to == 0 || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from as f64 / to as f64;
    let len = ((samples.len() as f64) / ratio).round().max(1.0) as usize;
    let last = samples.len() - 1;

    (0..len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let index = (pos.floor() as usize).min(last);
            let next = (index + 1).min(last);
            let frac = (pos - index as f64) as f32;
            samples[index] + (samples[next] - samples[index]) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames * channels as usize {
            let value = if i % 2 == 0 { 16384 } else { -16384 };
            writer.write_sample(value as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_generated_tone_length() {
        let tone = generate_tone(1000.0, 0.05, 44100);
        assert_eq!(tone.len(), 2205);
        assert!(tone.iter().all(|s| s.abs() <= 1.0));
        assert!(tone.last().unwrap().abs() < 0.01);
    }

    #[test]
    fn test_generated_voices_differ() {
        let bank = SoundBank::generated(44100);
        let accent = bank.sample(true, SoundSelector::Generated);
        let normal = bank.sample(false, SoundSelector::Generated);
        assert_eq!(accent.len(), normal.len());
        assert_ne!(accent[10], normal[10]);
    }

    #[test]
    fn test_missing_files_fall_back() {
        let dir = tempdir().unwrap();
        let config = PlaybackConfig {
            accent: VoiceConfig {
                sound: SoundSelector::Custom,
                offset: 0.0,
                file: Some(PathBuf::from("/nonexistent/click.wav")),
            },
            normal: VoiceConfig::with_sound(SoundSelector::Builtin),
            ..Default::default()
        };

        let bank = SoundBank::load(44100, dir.path(), &config);
        let generated = SoundBank::generated(44100);
        assert_eq!(
            bank.sample(true, SoundSelector::Custom)[..],
            generated.sample(true, SoundSelector::Generated)[..]
        );
        assert!(!bank.voice(false).has(SoundSelector::Builtin));
    }

    #[test]
    fn test_builtin_samples_loaded() {
        let dir = tempdir().unwrap();
        write_wav(&dir.path().join(BUILTIN_ACCENT), 44100, 1, 100);
        write_wav(&dir.path().join(BUILTIN_NORMAL), 22050, 2, 100);

        let bank = SoundBank::load(44100, dir.path(), &PlaybackConfig::default());
        assert_eq!(bank.sample(true, SoundSelector::Builtin).len(), 100);
        // 22.05kHz stereo resampled to 44.1kHz mono
        assert_eq!(bank.sample(false, SoundSelector::Builtin).len(), 200);
    }

    #[test]
    fn test_corrupt_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"not a wav file").unwrap();

        assert!(matches!(decode_wav(&path, 44100), Err(AudioError::Decode(_))));

        let config = PlaybackConfig {
            normal: VoiceConfig {
                sound: SoundSelector::Custom,
                offset: 0.0,
                file: Some(path),
            },
            ..Default::default()
        };
        let bank = SoundBank::load(44100, dir.path(), &config);
        assert_eq!(bank.sample(false, SoundSelector::Custom).len(), 2205);
    }

    #[test]
    fn test_stereo_mixdown() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 44100, 2, 10);

        // Left and right cancel out
        let samples = decode_wav(&path, 44100).unwrap();
        assert_eq!(samples.len(), 10);
        assert!(samples.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_resample() {
        let input: Vec<f32> = (0..100).map(|i| i as f32).collect();
        assert_eq!(resample(&input, 48000, 48000), input);

        let down = resample(&input, 48000, 24000);
        assert_eq!(down.len(), 50);
        assert_eq!(down[1], 2.0);

        let up = resample(&input, 24000, 48000);
        assert_eq!(up.len(), 200);
        assert_eq!(up[1], 0.5);
    }
}
