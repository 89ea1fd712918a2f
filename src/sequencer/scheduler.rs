// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Lookahead click scheduler.
//!
//! The scheduler is woken on a coarse, jittery timer. Each wake-up it
//! dispatches every beat whose time falls inside the lookahead window,
//! stamped with its exact audio-clock time, so when a click plays is
//! decided by the audio clock and not by when this code happens to run.
//!
//! Each beat carries two timestamps: the display time (the beat's grid
//! position) and the sound time (grid position plus the voice offset).
//! A beat is dispatched once its earliest sound time enters the window.

use tracing::{debug, info, warn};

use super::position::{BeatPosition, Step};
use super::BeatTiming;
use crate::arrangement::Song;
use crate::audio::{ClickRequest, SoundDispatch};
use crate::config::{ConfigError, PlaybackConfig};
use crate::timing::AudioClock;
use crate::ui::{project, DisplayEvent, DisplaySink};

/// Rounding slack for a sound landing exactly on the clock
const LATE_TOLERANCE: f64 = 1e-9;

/// Configuration for the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Lookahead window in milliseconds
    pub lookahead_ms: u32,
    /// Delay from start to the first beat in milliseconds
    pub lead_in_ms: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead_ms: 250,
            lead_in_ms: 50,
        }
    }
}

impl SchedulerConfig {
    /// Lookahead window in seconds
    pub fn lookahead(&self) -> f64 {
        self.lookahead_ms as f64 / 1000.0
    }

    /// Lead-in in seconds
    pub fn lead_in(&self) -> f64 {
        self.lead_in_ms as f64 / 1000.0
    }
}

/// Mutable playback state, owned by the scheduler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    /// Current position in the song
    pub position: BeatPosition,
    /// Audio-clock time of the next beat not yet dispatched
    pub next_scheduled_time: f64,
    /// Whether a run is in progress
    pub is_running: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            position: BeatPosition::start(),
            next_scheduled_time: 0.0,
            is_running: false,
        }
    }
}

/// Summary of one scheduling pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pass {
    /// Beats dispatched
    pub beats: usize,
    /// Clicks dropped because their time had already passed
    pub dropped: usize,
    /// Whether the last beat of the song was dispatched
    pub completed: bool,
}

/// Immutable snapshot of a run
#[derive(Debug, Clone)]
struct Run {
    config: PlaybackConfig,
    song: Song,
    timing: BeatTiming,
    /// Time of the first beat
    origin: f64,
    /// Most negative voice offset, or zero
    earliest_offset: f64,
    /// Beats dispatched so far
    beats: u64,
}

impl Run {
    fn beat_time(&self, beat: u64) -> f64 {
        self.origin + beat as f64 * self.timing.seconds_per_beat()
    }
}

/// Click scheduler driving a sound dispatcher and a display sink
pub struct Scheduler<C, S, D> {
    clock: C,
    sound: S,
    display: D,
    config: SchedulerConfig,
    run: Option<Run>,
    state: PlaybackState,
}

impl<C, S, D> Scheduler<C, S, D>
where
    C: AudioClock,
    S: SoundDispatch,
    D: DisplaySink,
{
    /// Create a new scheduler
    pub fn new(clock: C, sound: S, display: D) -> Self {
        Self::with_config(SchedulerConfig::default(), clock, sound, display)
    }

    /// Create scheduler with custom config
    pub fn with_config(config: SchedulerConfig, clock: C, sound: S, display: D) -> Self {
        Self {
            clock,
            sound,
            display,
            config,
            run: None,
            state: PlaybackState::default(),
        }
    }

    /// Start playing a song.
    ///
    /// The configuration is copied; later edits to it do not affect this
    /// run. Starting while already running does nothing.
    pub fn start(&mut self, config: &PlaybackConfig) -> Result<(), ConfigError> {
        if self.state.is_running {
            debug!("start ignored, already running");
            return Ok(());
        }
        config.validate()?;

        let mut config = config.clone();
        config.relayout();
        let song = Song::new(&config.song_parts);
        let timing = config.timing();

        // Shift the whole grid by whatever the lead-in leaves the earliest sound short
        let earliest_offset = config.accent.offset.min(config.normal.offset).min(0.0);
        let lead_in = self.config.lead_in();
        let shift = (-earliest_offset - lead_in).max(0.0);
        let t0 = self.clock.now();
        let origin = t0 + lead_in + shift;

        info!(
            tempo = timing.tempo,
            signature = %config.time_signature(),
            parts = song.len(),
            measures = song.total_measures(),
            shift,
            "metronome started"
        );

        self.state = PlaybackState {
            position: BeatPosition::start(),
            next_scheduled_time: origin,
            is_running: true,
        };
        self.run = Some(Run {
            config,
            song,
            timing,
            origin,
            earliest_offset,
            beats: 0,
        });

        self.on_wake();
        Ok(())
    }

    /// Stop playing and recall clicks that have not started yet.
    ///
    /// Safe to call at any time, including when already stopped.
    pub fn stop(&mut self) {
        if !self.state.is_running {
            return;
        }
        let now = self.clock.now();
        self.sound.cancel_after(now);
        self.reset();
        self.display.clear();
        info!("metronome stopped");
    }

    /// Start if stopped, stop if running; returns whether it is now running
    pub fn toggle(&mut self, config: &PlaybackConfig) -> Result<bool, ConfigError> {
        if self.state.is_running {
            self.stop();
        } else {
            self.start(config)?;
        }
        Ok(self.state.is_running)
    }

    /// Dispatch every beat due inside the lookahead window
    pub fn on_wake(&mut self) -> Pass {
        let mut pass = Pass::default();
        if !self.state.is_running {
            return pass;
        }

        let now = self.clock.now();
        let horizon = now + self.config.lookahead();
        let earliest_offset = self.run.as_ref().map_or(0.0, |run| run.earliest_offset);

        while self.state.is_running && self.state.next_scheduled_time + earliest_offset < horizon {
            let step = self.emit_beat(now, &mut pass);
            if step == Step::SongComplete {
                pass.completed = true;
                self.complete();
            }
        }

        if pass.dropped > 0 {
            warn!(dropped = pass.dropped, "clicks arrived too late and were dropped");
        }
        pass
    }

    fn emit_beat(&mut self, now: f64, pass: &mut Pass) -> Step {
        let Some(run) = self.run.as_mut() else {
            return Step::SongComplete;
        };

        let position = self.state.position;
        let display_at = self.state.next_scheduled_time;
        let accent = position.is_accent();
        let voice = run.config.voice(accent);
        let sound_at = display_at + voice.offset;

        if sound_at < now - LATE_TOLERANCE {
            pass.dropped += 1;
            debug!(at = sound_at, now, "click in the past, dropped");
        } else {
            self.sound.play_voice(ClickRequest {
                accent,
                sound: voice.sound,
                at: sound_at,
            });
        }

        if let Some(snapshot) = project(&position, &run.song, run.timing.beats_per_measure) {
            self.display.update_display(DisplayEvent {
                at: display_at,
                snapshot,
            });
            self.display.update_progress(position.measure);
        }
        debug!(position = %position.format(), at = display_at, accent, "beat scheduled");

        let step = self
            .state
            .position
            .advance(&run.song, run.timing.beats_per_measure);
        run.beats += 1;
        self.state.next_scheduled_time = run.beat_time(run.beats);
        pass.beats += 1;

        if step == Step::Part {
            if let Some(part) = run.song.part(self.state.position.part_index) {
                debug!(part = %part.name, "next part queued");
            }
        }
        step
    }

    /// End of song: stop scheduling but let the final clicks ring out
    fn complete(&mut self) {
        self.reset();
        self.display.song_complete();
        info!("song complete");
    }

    fn reset(&mut self) {
        self.state = PlaybackState::default();
        self.run = None;
    }

    /// Check if a run is in progress
    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    /// Get the playback state
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Get the song being played
    pub fn song(&self) -> Option<&Song> {
        self.run.as_ref().map(|run| &run.song)
    }

    /// Beat duration of the current run
    pub fn seconds_per_beat(&self) -> Option<f64> {
        self.run.as_ref().map(|run| run.timing.seconds_per_beat())
    }

    /// Get scheduler configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Get the audio clock
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Get the sound dispatcher
    pub fn sound(&self) -> &S {
        &self.sound
    }

    /// Get the display sink
    pub fn display(&self) -> &D {
        &self.display
    }

    /// Get the display sink mutably
    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrangement::SongPart;
    use crate::config::{SoundSelector, VoiceConfig};
    use crate::testing::{RecordingDisplay, RecordingSound};
    use crate::timing::ManualClock;
    use crate::ui::DisplaySnapshot;

    type TestScheduler = Scheduler<ManualClock, RecordingSound, RecordingDisplay>;

    fn scheduler(clock: &ManualClock) -> TestScheduler {
        Scheduler::new(clock.clone(), RecordingSound::default(), RecordingDisplay::default())
    }

    fn intro_verse() -> PlaybackConfig {
        PlaybackConfig {
            tempo: 120,
            beats_per_measure: 4,
            beat_unit: 4,
            song_parts: vec![SongPart::new("Intro", 2), SongPart::new("Verse", 3)],
            ..Default::default()
        }
    }

    /// Wake every `step` seconds until the run ends or `limit` is reached
    fn run_to_end(scheduler: &mut TestScheduler, clock: &ManualClock, step: f64, limit: f64) {
        while scheduler.is_running() && clock.now() < limit {
            clock.advance(step);
            scheduler.on_wake();
        }
    }

    #[test]
    fn test_scheduler_creation() {
        let clock = ManualClock::at(0.0);
        let scheduler = scheduler(&clock);
        assert!(!scheduler.is_running());
        assert!(scheduler.song().is_none());
        assert_eq!(scheduler.config().lookahead_ms, 250);
    }

    #[test]
    fn test_start_schedules_first_beat_after_lead_in() {
        let clock = ManualClock::at(3.0);
        let mut scheduler = scheduler(&clock);
        scheduler.start(&intro_verse()).unwrap();

        assert!(scheduler.is_running());
        assert_eq!(scheduler.seconds_per_beat(), Some(0.5));

        // First beat at 3.05 is inside the 250ms window, 3.55 is not
        let clicks = &scheduler.sound().clicks;
        assert_eq!(clicks.len(), 1);
        assert!(clicks[0].accent);
        assert!((clicks[0].at - 3.05).abs() < 1e-9);
        assert!((scheduler.state().next_scheduled_time - 3.55).abs() < 1e-9);
    }

    #[test]
    fn test_empty_song_rejected() {
        let clock = ManualClock::at(0.0);
        let mut scheduler = scheduler(&clock);
        let config = PlaybackConfig {
            song_parts: Vec::new(),
            ..Default::default()
        };

        let result = scheduler.start(&config);
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
        assert!(!scheduler.is_running());
        assert_eq!(*scheduler.state(), PlaybackState::default());
        assert!(scheduler.sound().clicks.is_empty());
    }

    #[test]
    fn test_full_song_beat_count() {
        let clock = ManualClock::at(0.0);
        let mut scheduler = scheduler(&clock);
        scheduler.start(&intro_verse()).unwrap();
        run_to_end(&mut scheduler, &clock, 0.025, 60.0);

        assert!(!scheduler.is_running());
        let display = scheduler.display();
        assert_eq!(display.events.len(), 20);
        assert_eq!(display.completions, 1);
        assert_eq!(scheduler.sound().clicks.len(), 20);

        // Final clicks are not recalled on natural completion
        assert!(scheduler.sound().cancels.is_empty());
    }

    #[test]
    fn test_click_times_on_grid() {
        let clock = ManualClock::at(0.0);
        let mut scheduler = scheduler(&clock);
        scheduler.start(&intro_verse()).unwrap();
        run_to_end(&mut scheduler, &clock, 0.037, 60.0);

        for (i, click) in scheduler.sound().clicks.iter().enumerate() {
            let expected = 0.05 + i as f64 * 0.5;
            assert!((click.at - expected).abs() < 1e-9, "beat {} at {}", i, click.at);
            assert_eq!(click.accent, i % 4 == 0);
        }
    }

    #[test]
    fn test_display_snapshots_follow_song() {
        let clock = ManualClock::at(0.0);
        let mut scheduler = scheduler(&clock);
        scheduler.start(&intro_verse()).unwrap();
        run_to_end(&mut scheduler, &clock, 0.025, 60.0);

        let events = &scheduler.display().events;
        let snap = |i: usize| -> &DisplaySnapshot { &events[i].snapshot };

        assert_eq!(snap(0).part_name, "Intro");
        assert_eq!(snap(0).next_part_name.as_deref(), Some("Verse"));
        assert_eq!(snap(4).measure_in_part, 2);
        assert_eq!(snap(8).part_name, "Verse");
        assert_eq!(snap(8).measure_in_part, 1);
        assert_eq!(snap(8).measures_in_part, 3);
        assert_eq!(snap(8).next_part_name, None);
        assert_eq!(snap(19).beat_in_measure, 4);

        assert_eq!(scheduler.display().progress[8], 3);
    }

    #[test]
    fn test_slow_wake_catches_up() {
        let clock = ManualClock::at(0.0);
        let mut scheduler = scheduler(&clock);
        scheduler.start(&intro_verse()).unwrap();

        // A wake-up arriving 2s late dispatches the whole backlog at once
        clock.advance(2.0);
        let pass = scheduler.on_wake();
        assert_eq!(pass.beats, 4);
        // 0.55, 1.05 and 1.55 are gone; 2.05 is still ahead of the clock
        assert_eq!(pass.dropped, 3);
        assert_eq!(scheduler.display().events.len(), 5);
        assert!(scheduler.is_running());

        // Grid is unchanged by the late wake-up
        assert!((scheduler.state().next_scheduled_time - 2.55).abs() < 1e-9);
    }

    #[test]
    fn test_stalled_wake_keeps_every_click() {
        let clock = ManualClock::at(0.0);
        let mut scheduler = scheduler(&clock);
        scheduler.start(&intro_verse()).unwrap();

        let mut dropped = 0;
        while clock.now() < 0.45 {
            clock.advance(0.025);
            dropped += scheduler.on_wake().dropped;
        }
        // Wake-ups due at 0.475, 0.5 and 0.525 all slip past the second beat
        clock.set(0.56);
        dropped += scheduler.on_wake().dropped;
        while scheduler.is_running() {
            clock.advance(0.025);
            dropped += scheduler.on_wake().dropped;
        }

        assert_eq!(dropped, 0);
        assert_eq!(scheduler.sound().clicks.len(), 20);
    }

    #[test]
    fn test_negative_offset_shifts_schedule() {
        let clock = ManualClock::at(10.0);
        let mut scheduler = scheduler(&clock);
        let mut config = intro_verse();
        config.accent.offset = -0.3;

        scheduler.start(&config).unwrap();
        run_to_end(&mut scheduler, &clock, 0.025, 30.0);

        let first_display = scheduler.display().events[0].at;
        assert!(first_display - 10.0 >= 0.3 - 1e-9);
        for click in &scheduler.sound().clicks {
            assert!(click.at >= 10.0 - 1e-9);
        }
        assert_eq!(scheduler.sound().clicks.len(), 20);
        assert!(scheduler.sound().clicks[0].accent);
    }

    #[test]
    fn test_small_negative_offset_fits_in_lead_in() {
        let clock = ManualClock::at(10.0);
        let mut scheduler = scheduler(&clock);
        let mut config = intro_verse();
        config.accent.offset = -0.02;

        scheduler.start(&config).unwrap();

        // The 50ms lead-in already covers 20ms, so the grid is not moved
        let first_display = scheduler.display().events[0].at;
        let first_click = scheduler.sound().clicks[0].at;
        assert!((first_display - 10.05).abs() < 1e-9);
        assert!((first_click - 10.03).abs() < 1e-9);
    }

    #[test]
    fn test_offsets_split_sound_and_display_times() {
        let clock = ManualClock::at(0.0);
        let mut scheduler = scheduler(&clock);
        let mut config = intro_verse();
        config.accent = VoiceConfig {
            sound: SoundSelector::Builtin,
            offset: 0.02,
            file: None,
        };
        config.normal.offset = -0.01;

        scheduler.start(&config).unwrap();
        run_to_end(&mut scheduler, &clock, 0.025, 30.0);

        let clicks = &scheduler.sound().clicks;
        let events = &scheduler.display().events;
        for (click, event) in clicks.iter().zip(events.iter()) {
            let offset = if click.accent { 0.02 } else { -0.01 };
            assert!((click.at - (event.at + offset)).abs() < 1e-9);
        }
        assert_eq!(clicks[0].sound, SoundSelector::Builtin);
        assert_eq!(clicks[1].sound, SoundSelector::Generated);
    }

    #[test]
    fn test_stop_cancels_and_clears() {
        let clock = ManualClock::at(0.0);
        let mut scheduler = scheduler(&clock);
        scheduler.start(&intro_verse()).unwrap();
        clock.advance(1.0);
        scheduler.on_wake();

        scheduler.stop();
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.sound().cancels, vec![1.0]);
        assert_eq!(scheduler.display().clears, 1);
        assert_eq!(scheduler.display().completions, 0);

        let after_first = *scheduler.state();
        scheduler.stop();
        assert_eq!(*scheduler.state(), after_first);
        assert_eq!(scheduler.display().clears, 1);
        assert_eq!(scheduler.sound().cancels.len(), 1);
    }

    #[test]
    fn test_stopped_scheduler_ignores_wake() {
        let clock = ManualClock::at(0.0);
        let mut scheduler = scheduler(&clock);
        clock.advance(5.0);
        assert_eq!(scheduler.on_wake(), Pass::default());
        assert!(scheduler.display().events.is_empty());
    }

    #[test]
    fn test_double_start_is_noop() {
        let clock = ManualClock::at(0.0);
        let mut scheduler = scheduler(&clock);
        scheduler.start(&intro_verse()).unwrap();
        let state = *scheduler.state();

        clock.advance(0.01);
        let mut other = intro_verse();
        other.tempo = 200;
        scheduler.start(&other).unwrap();

        assert_eq!(*scheduler.state(), state);
        assert_eq!(scheduler.seconds_per_beat(), Some(0.5));
    }

    #[test]
    fn test_config_snapshot_is_isolated() {
        let clock = ManualClock::at(0.0);
        let mut scheduler = scheduler(&clock);
        let mut config = intro_verse();
        scheduler.start(&config).unwrap();

        config.song_parts.clear();
        config.tempo = 60;
        run_to_end(&mut scheduler, &clock, 0.025, 60.0);

        assert_eq!(scheduler.display().events.len(), 20);
    }

    #[test]
    fn test_toggle() {
        let clock = ManualClock::at(0.0);
        let mut scheduler = scheduler(&clock);
        assert!(scheduler.toggle(&intro_verse()).unwrap());
        assert!(!scheduler.toggle(&intro_verse()).unwrap());
        assert!(scheduler.toggle(&intro_verse()).unwrap());
    }

    #[test]
    fn test_restart_after_completion() {
        let clock = ManualClock::at(0.0);
        let mut scheduler = scheduler(&clock);
        scheduler.start(&intro_verse()).unwrap();
        run_to_end(&mut scheduler, &clock, 0.025, 60.0);
        assert!(!scheduler.is_running());

        scheduler.start(&intro_verse()).unwrap();
        assert_eq!(scheduler.state().position, BeatPosition::start());
        assert!(scheduler.is_running());
    }
}
