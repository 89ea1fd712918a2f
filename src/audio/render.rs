// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Sample-accurate click mixer run inside the output callback.
//!
//! The renderer owns the frame counter that [`StreamClock`] reads, so a
//! click stamped `at` seconds starts exactly at frame `at * sample_rate`.
//!
//! [`StreamClock`]: crate::timing::StreamClock

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::Arc;

use super::sounds::{Samples, SoundBank};
use super::AudioCommand;

/// A click placed on the frame timeline
#[derive(Debug, Clone)]
struct ScheduledClick {
    start: u64,
    samples: Samples,
}

impl ScheduledClick {
    fn end(&self) -> u64 {
        self.start + self.samples.len() as u64
    }
}

/// Click mixer fed by an `AudioCommand` channel
pub struct ClickRenderer {
    bank: Box<SoundBank>,
    commands: Receiver<AudioCommand>,
    retired: Option<SyncSender<Box<SoundBank>>>,
    frames: Arc<AtomicU64>,
    clicks: Vec<ScheduledClick>,
    dropped: u64,
}

impl ClickRenderer {
    /// Create a renderer advancing the given frame counter
    pub fn new(bank: SoundBank, commands: Receiver<AudioCommand>, frames: Arc<AtomicU64>) -> Self {
        Self {
            bank: Box::new(bank),
            commands,
            retired: None,
            frames,
            clicks: Vec::with_capacity(64),
            dropped: 0,
        }
    }

    /// Hand replaced sound banks back over `retired` instead of freeing
    /// them inside the callback
    pub fn with_retired(mut self, retired: SyncSender<Box<SoundBank>>) -> Self {
        self.retired = Some(retired);
        self
    }

    /// Fill an interleaved buffer and advance the clock by its length
    pub fn render(&mut self, buffer: &mut [f32], channels: usize) {
        self.drain_commands();

        let channels = channels.max(1);
        let frame_count = buffer.len() / channels;
        let block_start = self.frames.load(Ordering::Acquire);
        let block_end = block_start + frame_count as u64;

        for click in &self.clicks {
            if click.start >= block_end || click.end() <= block_start {
                continue;
            }
            let first = click.start.max(block_start);
            let last = click.end().min(block_end);
            for frame in first..last {
                let sample = click.samples[(frame - click.start) as usize];
                let offset = (frame - block_start) as usize * channels;
                for out in &mut buffer[offset..offset + channels] {
                    *out = (*out + sample).clamp(-1.0, 1.0);
                }
            }
        }

        self.clicks.retain(|click| click.end() > block_end);
        self.frames.store(block_end, Ordering::Release);
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: AudioCommand) {
        let now = self.frames.load(Ordering::Acquire);
        match command {
            AudioCommand::Play(request) => {
                let start = self.frame_at(request.at);
                if start < now {
                    self.dropped += 1;
                    return;
                }
                let samples = self.bank.sample(request.accent, request.sound);
                self.clicks.push(ScheduledClick { start, samples });
            }
            AudioCommand::CancelAfter(at) => {
                let cutoff = self.frame_at(at).max(now);
                self.clicks.retain(|click| click.start <= cutoff);
            }
            AudioCommand::SetBank(bank) => {
                let old = std::mem::replace(&mut self.bank, bank);
                if let Some(retired) = &self.retired {
                    // A full or closed channel hands the bank back and it is freed here
                    let _ = retired.try_send(old);
                }
            }
        }
    }

    fn frame_at(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.bank.sample_rate() as f64).round() as u64
    }

    /// Clicks waiting to start or still sounding
    pub fn pending(&self) -> usize {
        self.clicks.len()
    }

    /// Clicks that arrived after their start frame
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }
}
