// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Recording sinks shared by unit tests.

use crate::audio::{ClickRequest, SoundDispatch};
use crate::ui::{DisplayEvent, DisplaySink};

/// Sound dispatcher that keeps every request
#[derive(Debug, Default)]
pub struct RecordingSound {
    pub clicks: Vec<ClickRequest>,
    pub cancels: Vec<f64>,
}

impl SoundDispatch for RecordingSound {
    fn play_voice(&mut self, request: ClickRequest) {
        self.clicks.push(request);
    }

    fn cancel_after(&mut self, at: f64) {
        self.cancels.push(at);
        self.clicks.retain(|c| c.at <= at);
    }
}

/// Display sink that keeps every update
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub events: Vec<DisplayEvent>,
    pub progress: Vec<u32>,
    pub clears: usize,
    pub completions: usize,
}

impl DisplaySink for RecordingDisplay {
    fn update_display(&mut self, event: DisplayEvent) {
        self.events.push(event);
    }

    fn update_progress(&mut self, measure: u32) {
        self.progress.push(measure);
    }

    fn clear(&mut self) {
        self.clears += 1;
    }

    fn song_complete(&mut self) {
        self.completions += 1;
    }
}
