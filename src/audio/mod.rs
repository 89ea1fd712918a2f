// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio engine for the metronome.
//!
//! This module provides:
//! - The `SoundDispatch` seam the scheduler sends clicks through
//! - Click sounds (generated tones and WAV samples)
//! - A sample-accurate click renderer
//! - Audio output via cpal

pub mod output;
pub mod render;
pub mod sounds;

pub use output::{default_device_name, list_devices, AudioConfig, AudioOutput};
pub use render::ClickRenderer;
pub use sounds::SoundBank;

use std::sync::atomic::AtomicU64;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

use crate::config::SoundSelector;
use crate::timing::StreamClock;

/// A click to play at an exact audio-clock time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickRequest {
    /// Accented (first beat of a measure)
    pub accent: bool,
    /// Sound selected for the voice
    pub sound: SoundSelector,
    /// Audio-clock time in seconds
    pub at: f64,
}

/// Receives timestamped clicks from the scheduler.
///
/// Implementations must not block; they are called from inside a
/// scheduling pass.
pub trait SoundDispatch {
    /// Queue a click to start at `request.at`
    fn play_voice(&mut self, request: ClickRequest);

    /// Drop queued clicks that have not started by `at`
    fn cancel_after(&mut self, at: f64);
}

/// Messages to the render thread
#[derive(Debug)]
pub enum AudioCommand {
    /// Queue a click
    Play(ClickRequest),
    /// Cancel clicks starting after a time
    CancelAfter(f64),
    /// Replace the sound bank
    SetBank(Box<SoundBank>),
}

/// Replaced banks in flight back from the renderer
const RETIRED_CAPACITY: usize = 8;

/// Sound banks the renderer has swapped out, freed on the control side
#[derive(Debug)]
struct RetiredBanks {
    receiver: Receiver<Box<SoundBank>>,
    held: Vec<Box<SoundBank>>,
}

impl RetiredBanks {
    fn new(receiver: Receiver<Box<SoundBank>>) -> Self {
        Self {
            receiver,
            held: Vec::new(),
        }
    }

    /// Free every bank no click holds anymore; returns how many are left
    fn collect(&mut self) -> usize {
        self.held.extend(self.receiver.try_iter());
        self.held.retain(|bank| bank.is_shared());
        self.held.len()
    }
}

/// `SoundDispatch` that forwards to a render thread over a channel
#[derive(Debug, Clone)]
pub struct ChannelDispatch {
    sender: Sender<AudioCommand>,
    retired: Option<Arc<Mutex<RetiredBanks>>>,
}

impl ChannelDispatch {
    /// Wrap a command sender
    pub fn new(sender: Sender<AudioCommand>) -> Self {
        Self {
            sender,
            retired: None,
        }
    }

    /// Also free the banks a renderer built `with_retired` hands back
    pub fn with_retired(sender: Sender<AudioCommand>, retired: Receiver<Box<SoundBank>>) -> Self {
        Self {
            sender,
            retired: Some(Arc::new(Mutex::new(RetiredBanks::new(retired)))),
        }
    }

    /// Swap the sounds the renderer plays
    pub fn set_bank(&self, bank: SoundBank) {
        self.collect_retired();
        self.send(AudioCommand::SetBank(Box::new(bank)));
    }

    /// Free replaced banks the renderer is done with.
    ///
    /// Returns how many are still held because a queued or sounding click
    /// uses their samples.
    pub fn collect_retired(&self) -> usize {
        let Some(retired) = &self.retired else {
            return 0;
        };
        match retired.lock() {
            Ok(mut retired) => retired.collect(),
            Err(_) => 0,
        }
    }

    fn send(&self, command: AudioCommand) {
        if self.sender.send(command).is_err() {
            debug!("audio renderer gone, command discarded");
        }
    }
}

impl SoundDispatch for ChannelDispatch {
    fn play_voice(&mut self, request: ClickRequest) {
        self.send(AudioCommand::Play(request));
    }

    fn cancel_after(&mut self, at: f64) {
        self.send(AudioCommand::CancelAfter(at));
        self.collect_retired();
    }
}

/// Output stream plus the renderer it drives
pub struct AudioEngine {
    config: AudioConfig,
    frames: Arc<AtomicU64>,
    receiver: Option<Receiver<AudioCommand>>,
    retired_sender: SyncSender<Box<SoundBank>>,
    dispatch: ChannelDispatch,
    output: Option<AudioOutput>,
}

impl AudioEngine {
    /// Create an engine; no device is opened until `start`
    pub fn new(config: AudioConfig) -> Self {
        let (sender, receiver) = mpsc::channel();
        let (retired_sender, retired) = mpsc::sync_channel(RETIRED_CAPACITY);
        let dispatch = ChannelDispatch::with_retired(sender, retired);
        Self {
            config,
            frames: Arc::new(AtomicU64::new(0)),
            receiver: Some(receiver),
            retired_sender,
            dispatch,
            output: None,
        }
    }

    /// Open the output stream with an initial sound bank
    pub fn start(&mut self, bank: SoundBank) -> Result<(), AudioError> {
        if self.output.is_some() {
            return Ok(());
        }
        if bank.sample_rate() != self.config.sample_rate {
            return Err(AudioError::InvalidConfig(format!(
                "sound bank is {} Hz but output is {} Hz",
                bank.sample_rate(),
                self.config.sample_rate
            )));
        }
        let receiver = self
            .receiver
            .take()
            .ok_or_else(|| AudioError::InitFailed("engine already used".to_string()))?;

        let mut renderer = ClickRenderer::new(bank, receiver, Arc::clone(&self.frames))
            .with_retired(self.retired_sender.clone());
        let output = AudioOutput::new(self.config.clone(), move |buffer, channels| {
            renderer.render(buffer, channels);
        })?;

        self.output = Some(output);
        Ok(())
    }

    /// Close the output stream
    pub fn stop(&mut self) {
        self.output = None;
    }

    /// Check if running
    pub fn is_running(&self) -> bool {
        self.output.is_some()
    }

    /// Clock driven by this engine's output
    pub fn clock(&self) -> StreamClock {
        StreamClock::new(Arc::clone(&self.frames), self.config.sample_rate)
    }

    /// Dispatcher feeding this engine's renderer
    pub fn dispatch(&self) -> ChannelDispatch {
        self.dispatch.clone()
    }

    /// Get sample rate
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Name of the open device
    pub fn device_name(&self) -> Option<&str> {
        self.output.as_ref().map(AudioOutput::device_name)
    }
}

/// Audio error types
#[derive(Debug, Clone, Error)]
pub enum AudioError {
    /// Failed to initialize audio
    #[error("Audio initialization failed: {0}")]
    InitFailed(String),
    /// Failed to start audio stream
    #[error("Audio stream failed: {0}")]
    StreamFailed(String),
    /// No audio device available
    #[error("No audio device available")]
    NoDevice,
    /// A sample file could not be decoded
    #[error("Sample decode failed: {0}")]
    Decode(String),
    /// Invalid configuration
    #[error("Invalid audio configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::AudioClock;

    #[test]
    fn test_audio_engine_creation() {
        let engine = AudioEngine::new(AudioConfig::default());
        assert!(!engine.is_running());
        assert_eq!(engine.sample_rate(), 44100);
        assert_eq!(engine.clock().now(), 0.0);
        assert!(engine.device_name().is_none());
    }

    #[test]
    fn test_bank_rate_mismatch_rejected() {
        let mut engine = AudioEngine::new(AudioConfig::default());
        let result = engine.start(SoundBank::generated(48000));
        assert!(matches!(result, Err(AudioError::InvalidConfig(_))));
        assert!(!engine.is_running());
    }

    #[test]
    fn test_channel_dispatch_forwards() {
        let (tx, rx) = mpsc::channel();
        let mut dispatch = ChannelDispatch::new(tx);
        let request = ClickRequest {
            accent: true,
            sound: SoundSelector::Generated,
            at: 1.5,
        };

        dispatch.play_voice(request);
        dispatch.cancel_after(2.0);

        assert!(matches!(rx.try_recv(), Ok(AudioCommand::Play(r)) if r == request));
        assert!(matches!(rx.try_recv(), Ok(AudioCommand::CancelAfter(t)) if t == 2.0));
    }

    #[test]
    fn test_retired_bank_freed_once_idle() {
        let (tx, rx) = mpsc::channel();
        let (retired_tx, retired_rx) = mpsc::sync_channel(RETIRED_CAPACITY);
        let mut renderer = ClickRenderer::new(
            SoundBank::generated(8000),
            rx,
            Arc::new(AtomicU64::new(0)),
        )
        .with_retired(retired_tx);
        let mut dispatch = ChannelDispatch::with_retired(tx, retired_rx);

        dispatch.play_voice(ClickRequest {
            accent: false,
            sound: SoundSelector::Generated,
            at: 0.0,
        });
        dispatch.set_bank(SoundBank::generated(8000));
        let mut buffer = vec![0.0; 64];
        renderer.render(&mut buffer, 1);

        // The first click is still sounding from the old bank
        assert_eq!(dispatch.collect_retired(), 1);

        // 50ms is 400 frames
        let mut buffer = vec![0.0; 512];
        renderer.render(&mut buffer, 1);
        assert_eq!(renderer.pending(), 0);
        assert_eq!(dispatch.collect_retired(), 0);
    }

    #[test]
    fn test_dispatch_survives_closed_renderer() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let mut dispatch = ChannelDispatch::new(tx);
        dispatch.cancel_after(0.0);
    }
}
