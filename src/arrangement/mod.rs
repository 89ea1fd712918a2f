// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Song arrangement.
//!
//! This module provides:
//! - Parts: named runs of measures with a derived measure layout
//! - Song: the laid-out snapshot the scheduler plays through

pub mod part;
pub mod song;

pub use part::{default_song_parts, is_laid_out, layout_parts, measure_total, SongPart};
pub use song::{Song, SongLength};
