// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing and clock module.
//!
//! This module provides the audio clocks the scheduler places clicks on,
//! plus the supported tempo range.

pub mod clock;

pub use clock::{
    clamp_tempo, AudioClock, ManualClock, StreamClock, SystemClock, MAX_TEMPO, MIN_TEMPO,
};
