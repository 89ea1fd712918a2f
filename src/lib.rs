// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Song-structured click metronome.
//!
//! Clicks are placed on an audio clock by a lookahead scheduler that is
//! woken on a coarse timer, while a beat/measure/part counter tracks where
//! in the song each click falls.

pub mod arrangement;
pub mod audio;
pub mod config;
pub mod sequencer;
pub mod timing;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;
