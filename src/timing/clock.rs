// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio clock implementations.
//!
//! The scheduler never looks at wall-clock time directly. It reads an
//! [`AudioClock`]: a monotonic, high-resolution clock in seconds on which
//! click events are placed. The coarse timer that wakes the scheduler up
//! is a separate concern (see `sequencer::driver`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Slowest supported tempo
pub const MIN_TEMPO: u32 = 20;

/// Fastest supported tempo
pub const MAX_TEMPO: u32 = 300;

/// Clamp a tempo into the supported range
pub fn clamp_tempo(bpm: u32) -> u32 {
    bpm.clamp(MIN_TEMPO, MAX_TEMPO)
}

/// Monotonic clock that click timestamps are expressed in
pub trait AudioClock {
    /// Current time in seconds
    fn now(&self) -> f64;
}

impl<C: AudioClock + ?Sized> AudioClock for Arc<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// Clock backed by `Instant`, used when no audio stream is running
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock that reads zero now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock derived from the number of frames an output stream has rendered.
///
/// The render callback owns the counter and is the only writer; this
/// handle just reads it. Time only moves while the stream is pulling audio.
#[derive(Debug, Clone)]
pub struct StreamClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl StreamClock {
    /// Create a clock over a shared frame counter
    pub fn new(frames: Arc<AtomicU64>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate: sample_rate.max(1),
        }
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Get sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioClock for StreamClock {
    fn now(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Manually driven clock for tests, benches and offline runs
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock at the given time
    pub fn at(seconds: f64) -> Self {
        let clock = Self::default();
        clock.set(seconds);
        clock
    }

    /// Jump to an absolute time
    pub fn set(&self, seconds: f64) {
        self.bits.store(seconds.to_bits(), Ordering::Release);
    }

    /// Move time forward
    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_tempo_clamping() {
        assert_eq!(clamp_tempo(10), 20);
        assert_eq!(clamp_tempo(120), 120);
        assert_eq!(clamp_tempo(500), 300);
    }

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now();
        thread::sleep(Duration::from_millis(5));
        let second = clock.now();
        assert!(second > first);
        assert!(second >= 0.005);
    }

    #[test]
    fn test_stream_clock_follows_frames() {
        let frames = Arc::new(AtomicU64::new(0));
        let clock = StreamClock::new(Arc::clone(&frames), 48_000);
        assert_eq!(clock.now(), 0.0);

        frames.store(24_000, Ordering::Release);
        assert_eq!(clock.now(), 0.5);
        assert_eq!(clock.frames(), 24_000);
    }

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::at(1.0);
        let handle = clock.clone();
        handle.advance(0.25);
        assert_eq!(clock.now(), 1.25);

        clock.set(10.0);
        assert_eq!(handle.now(), 10.0);
    }

    #[test]
    fn test_arc_clock() {
        let clock: Arc<ManualClock> = Arc::new(ManualClock::at(2.0));
        assert_eq!(AudioClock::now(&clock), 2.0);
    }
}
