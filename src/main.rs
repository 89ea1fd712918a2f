// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use crossterm::event::{Event, KeyEventKind};
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use metronome::arrangement::Song;
use metronome::audio::{self, AudioEngine, ChannelDispatch, SoundBank};
use metronome::config::settings::SETTINGS_FILE;
use metronome::config::{
    validate_profiles, ConfigEvent, ConfigWatcher, EngineSettings, PlaybackConfig, ProfileStore,
};
use metronome::sequencer::{Scheduler, SchedulerHandle};
use metronome::timing::{clamp_tempo, AudioClock};
use metronome::ui::{App, KeyAction, LogSink, TerminalSink, UiState};

const LOG_FILE: &str = "metronome.log";

fn print_usage() {
    println!("Metronome - song-structured click track");
    println!();
    println!("Usage: metronome [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --list-devices              List available audio output devices");
    println!("  --init <FILE>               Write a profile file with the default song");
    println!("  --check <FILE>              Validate every profile in a profile file");
    println!("  --length <FILE> [PROFILE]   Print the song structure and playing time");
    println!("  --play <FILE> [PROFILE]     Play a profile with the terminal display");
    println!("  --headless <FILE> [PROFILE] Play a profile once, logging each beat");
    println!("  --help                      Show this help message");
    println!();
    println!("Engine settings are read from {} if present.", SETTINGS_FILE);
    println!("Set RUST_LOG to change log verbosity.");
}

fn init_tracing(default_level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let result = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {:?}", path))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init()
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };
    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

fn list_devices() {
    let default = audio::default_device_name();
    let devices = audio::list_devices();
    if devices.is_empty() {
        println!("No audio output devices found");
        return;
    }
    println!("Audio output devices:");
    for (i, name) in devices.iter().enumerate() {
        let marker = if default.as_deref() == Some(name.as_str()) {
            " (default)"
        } else {
            ""
        };
        println!("  {}: {}{}", i, name, marker);
    }
}

fn init_profiles(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{:?} already exists", path);
    }
    ProfileStore::with_default_profile().save(path)?;
    println!("Wrote default profile to {:?}", path);
    Ok(())
}

fn check_profiles(path: &Path) -> Result<()> {
    let store = validate_profiles(path)?;
    println!("{:?}: {} profile(s) OK", path, store.profiles.len());
    for name in store.names() {
        println!("  {}", name);
    }
    Ok(())
}

fn print_length(path: &Path, profile: Option<&str>) -> Result<()> {
    let store = ProfileStore::load(path)?;
    let name = store.resolve_name(profile)?;
    let config = store.select(Some(name))?;
    config.validate()?;

    let song = Song::new(&config.song_parts);
    println!(
        "Profile: {} ({} BPM, {})",
        name,
        config.tempo,
        config.time_signature()
    );
    for part in song.parts() {
        println!(
            "  {:<14} {:>3} measures  ({}-{})",
            part.name, part.measures, part.start_measure, part.end_measure
        );
    }
    println!("Total: {}", song.length(&config.timing()));
    Ok(())
}

/// Load a profile's sounds and open the output stream
fn open_audio(settings: &EngineSettings, config: &PlaybackConfig) -> Result<AudioEngine> {
    let mut engine = AudioEngine::new(settings.audio_config());
    let bank = SoundBank::load(settings.sample_rate, &settings.sounds_dir, config);
    engine.start(bank).context("Failed to open audio output")?;
    Ok(engine)
}

fn play_headless(path: &Path, profile: Option<&str>) -> Result<()> {
    let settings = EngineSettings::load_or_default(SETTINGS_FILE)?;
    let store = validate_profiles(path)?;
    let config = store.select(profile)?.clone();

    let runtime = Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async {
        let engine = open_audio(&settings, &config)?;
        let scheduler = Scheduler::with_config(
            settings.scheduler_config(),
            engine.clock(),
            engine.dispatch(),
            LogSink::new(),
        );
        let (mut handle, task) = SchedulerHandle::spawn(scheduler, settings.wake_interval());

        let song = Song::new(&config.song_parts);
        info!(
            tempo = config.tempo,
            signature = %config.time_signature(),
            length = %song.length(&config.timing()),
            "playing"
        );
        handle.start(&config)?;

        tokio::select! {
            status = handle.wait_for(|s| s.completed > 0 || s.error.is_some()) => {
                if let Some(error) = status?.error {
                    bail!("Could not start: {}", error);
                }
                // Let the final clicks ring out
                tokio::time::sleep(Duration::from_millis(settings.lookahead_ms as u64 + 200)).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
            }
        }

        handle.shutdown()?;
        let scheduler = task.await.context("Scheduler task failed")?;
        let log = scheduler.display();
        info!(beats = log.beats(), completed = log.completed(), "done");
        Ok(())
    })
}

/// Profile selection for the interactive player
struct Session {
    path: PathBuf,
    store: ProfileStore,
    selected: String,
    config: PlaybackConfig,
}

impl Session {
    fn new(path: &Path, profile: Option<&str>) -> Result<Self> {
        let store = validate_profiles(path)?;
        let selected = store.resolve_name(profile)?.to_string();
        let config = store.select(Some(&selected))?.clone();
        Ok(Self {
            path: path.to_path_buf(),
            store,
            selected,
            config,
        })
    }

    /// Step through profile names; returns false if there is nowhere to go
    fn cycle(&mut self, forward: bool) -> bool {
        let names = self.store.names();
        let Some(index) = names.iter().position(|n| *n == self.selected) else {
            return false;
        };
        if names.len() < 2 {
            return false;
        }
        let next = if forward {
            (index + 1) % names.len()
        } else {
            (index + names.len() - 1) % names.len()
        };
        let name = names[next].to_string();
        self.select(&name)
    }

    fn select(&mut self, name: &str) -> bool {
        match self.store.get(name) {
            Some(config) => {
                self.selected = name.to_string();
                self.config = config.clone();
                true
            }
            None => false,
        }
    }

    /// Replace the profile store, keeping the selection when it still exists
    fn reload(&mut self, store: ProfileStore) -> Result<()> {
        let keep = store.get(&self.selected).is_some();
        self.store = store;
        let name = if keep {
            self.selected.clone()
        } else {
            self.store.resolve_name(None)?.to_string()
        };
        self.select(&name);
        Ok(())
    }

    /// Push the current profile to the display and the renderer
    fn apply(&self, state: &Mutex<UiState>, sounds: &ChannelDispatch, settings: &EngineSettings) {
        sounds.set_bank(SoundBank::load(
            settings.sample_rate,
            &settings.sounds_dir,
            &self.config,
        ));
        if let Ok(mut state) = state.lock() {
            state.load_profile(&self.selected, &self.config);
        }
    }
}

fn set_status(state: &Mutex<UiState>, message: impl Into<String>) {
    if let Ok(mut state) = state.lock() {
        state.set_status(message);
    }
}

fn play_interactive(path: &Path, profile: Option<&str>) -> Result<()> {
    let settings = EngineSettings::load_or_default(SETTINGS_FILE)?;
    let mut session = Session::new(path, profile)?;

    let runtime = Runtime::new().context("Failed to start async runtime")?;
    let _guard = runtime.enter();

    let engine = open_audio(&settings, &session.config)?;
    let clock = engine.clock();
    let sounds = engine.dispatch();

    let state = Arc::new(Mutex::new(UiState::default()));
    session.apply(&state, &sounds, &settings);

    let scheduler = Scheduler::with_config(
        settings.scheduler_config(),
        clock.clone(),
        sounds.clone(),
        TerminalSink::new(Arc::clone(&state)),
    );
    let (handle, task) = SchedulerHandle::spawn(scheduler, settings.wake_interval());

    let watcher = match ConfigWatcher::new(&session.path, None) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!(error = %e, "profile hot reload disabled");
            None
        }
    };
    let mut pending_reload: Option<ProfileStore> = None;
    let mut last_error: Option<String> = None;

    let mut app = App::new(Arc::clone(&state))?;
    while app.is_running() {
        if let Some(watcher) = &watcher {
            for event in watcher.recv_all() {
                match event {
                    ConfigEvent::Reloaded(store) => pending_reload = Some(*store),
                    ConfigEvent::Error(message) => set_status(&state, message),
                    ConfigEvent::Removed(path) => {
                        set_status(&state, format!("{:?} was removed", path))
                    }
                }
            }
        }

        let status = handle.status();
        // The running song keeps its settings; reloads wait until it stops
        if !status.running {
            if let Some(store) = pending_reload.take() {
                session.reload(store)?;
                session.apply(&state, &sounds, &settings);
                set_status(&state, "Profiles reloaded");
            }
        }
        if status.error != last_error {
            if let Some(error) = &status.error {
                set_status(&state, error.clone());
            }
            last_error = status.error.clone();
        }
        if let Ok(mut state) = state.lock() {
            state.transport.playing = status.running;
        }

        app.draw(clock.now())?;

        let Some(Event::Key(key)) = app.poll_event()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match app.handle_key(key.code, key.modifiers) {
            KeyAction::TogglePlay => handle.toggle(&session.config)?,
            KeyAction::Stop => handle.stop()?,
            KeyAction::TempoUp => change_tempo(&mut session, &state, 1, status.running),
            KeyAction::TempoDown => change_tempo(&mut session, &state, -1, status.running),
            KeyAction::NextProfile => {
                change_profile(&mut session, &state, &sounds, &settings, true, status.running)
            }
            KeyAction::PreviousProfile => {
                change_profile(&mut session, &state, &sounds, &settings, false, status.running)
            }
            KeyAction::Quit | KeyAction::ToggleHelp | KeyAction::None => {}
        }
    }
    drop(app);

    // The task may already be gone if the runtime is shutting down
    let _ = handle.shutdown();
    runtime.block_on(task).context("Scheduler task failed")?;
    info!("bye");
    Ok(())
}

/// Tempo edits only reach the scheduler on the next start
fn change_tempo(session: &mut Session, state: &Mutex<UiState>, delta: i64, running: bool) {
    let tempo = (session.config.tempo as i64 + delta).max(0) as u32;
    session.config.tempo = clamp_tempo(tempo);
    if let Ok(mut state) = state.lock() {
        state.transport.tempo = session.config.tempo;
    }
    if running {
        set_status(state, "New tempo applies from the next start");
    }
}

fn change_profile(
    session: &mut Session,
    state: &Mutex<UiState>,
    sounds: &ChannelDispatch,
    settings: &EngineSettings,
    forward: bool,
    running: bool,
) {
    if running {
        set_status(state, "Stop before switching profiles");
    } else if session.cycle(forward) {
        session.apply(state, sounds, settings);
    }
}

fn file_arg<'a>(args: &'a [String], flag: &str) -> &'a str {
    match args.get(2) {
        Some(path) => path,
        None => {
            eprintln!("Error: {} requires a profile file", flag);
            eprintln!("Use --init <FILE> to create one");
            std::process::exit(1);
        }
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Metronome - song-structured click track");
        println!("Run with --help for usage information");
        return Ok(());
    }

    let profile = args.get(3).map(String::as_str);

    match args[1].as_str() {
        "--list-devices" => {
            init_tracing("warn", None)?;
            list_devices();
        }
        "--init" => {
            init_tracing("warn", None)?;
            init_profiles(Path::new(file_arg(&args, "--init")))?;
        }
        "--check" => {
            init_tracing("warn", None)?;
            check_profiles(Path::new(file_arg(&args, "--check")))?;
        }
        "--length" => {
            init_tracing("warn", None)?;
            print_length(Path::new(file_arg(&args, "--length")), profile)?;
        }
        "--headless" => {
            init_tracing("info", None)?;
            play_headless(Path::new(file_arg(&args, "--headless")), profile)?;
        }
        "--play" => {
            // The terminal belongs to the UI, so logs go to a file
            init_tracing("info", Some(Path::new(LOG_FILE)))?;
            play_interactive(Path::new(file_arg(&args, "--play")), profile)?;
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
