// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! File watcher for hot-reloading the profile file.
//!
//! Reloads are only reported here. Applying one is up to the front end,
//! which must hold it back while a song is playing: the scheduler keeps
//! the configuration it was started with until it stops.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::ProfileStore;

/// Events emitted by the config watcher
#[derive(Debug, Clone)]
pub enum ConfigEvent {
    /// Profile file was modified and successfully reloaded
    Reloaded(Box<ProfileStore>),
    /// Profile file was modified but failed to parse
    Error(String),
    /// Profile file was deleted
    Removed(PathBuf),
}

/// Profile file watcher with debouncing
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    event_receiver: Receiver<ConfigEvent>,
    watched_path: PathBuf,
}

impl ConfigWatcher {
    /// Create a new watcher for a profile file
    ///
    /// # Arguments
    /// * `path` - Profile file to watch
    /// * `debounce_ms` - Debounce duration in milliseconds (default: 500)
    pub fn new<P: AsRef<Path>>(path: P, debounce_ms: Option<u64>) -> Result<Self> {
        let watched_path = path.as_ref().to_path_buf();
        let debounce_duration = Duration::from_millis(debounce_ms.unwrap_or(500));

        let (event_tx, event_rx): (Sender<ConfigEvent>, Receiver<ConfigEvent>) = mpsc::channel();
        let (notify_tx, notify_rx): (Sender<Event>, Receiver<Event>) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            },
            Config::default(),
        )
        .map_err(|e| anyhow!("Failed to create file watcher: {}", e))?;

        // Editors often replace files, so watch the parent directory
        let watch_dir = watched_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| anyhow!("Failed to watch path {:?}: {}", watch_dir, e))?;

        let target = watched_path.clone();
        std::thread::spawn(move || {
            let mut last_event_time: Option<Instant> = None;

            loop {
                match notify_rx.recv_timeout(Duration::from_millis(50)) {
                    Ok(event) => {
                        if !event.paths.iter().any(|p| same_file(p, &target)) {
                            continue;
                        }
                        match event.kind {
                            EventKind::Remove(_) => {
                                last_event_time = None;
                                if event_tx.send(ConfigEvent::Removed(target.clone())).is_err() {
                                    break;
                                }
                            }
                            EventKind::Create(_) | EventKind::Modify(_) => {
                                last_event_time = Some(Instant::now());
                            }
                            _ => {}
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        let settled = last_event_time
                            .map(|t| t.elapsed() >= debounce_duration)
                            .unwrap_or(false);
                        if settled {
                            last_event_time = None;
                            let event = match ProfileStore::load(&target) {
                                Ok(store) => {
                                    tracing::info!(path = ?target, "profile file reloaded");
                                    ConfigEvent::Reloaded(Box::new(store))
                                }
                                Err(e) => {
                                    tracing::warn!(path = ?target, error = %e, "profile reload failed");
                                    ConfigEvent::Error(format!("Failed to load {:?}: {}", target, e))
                                }
                            };
                            if event_tx.send(event).is_err() {
                                break;
                            }
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            event_receiver: event_rx,
            watched_path,
        })
    }

    /// Try to receive the next config event (non-blocking)
    pub fn try_recv(&self) -> Option<ConfigEvent> {
        self.event_receiver.try_recv().ok()
    }

    /// Receive all pending config events
    pub fn recv_all(&self) -> Vec<ConfigEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Get the path being watched
    pub fn watched_path(&self) -> &Path {
        &self.watched_path
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.file_name() == b.file_name(),
    }
}

/// Check that a profile file parses and every profile in it can be played
pub fn validate_profiles<P: AsRef<Path>>(path: P) -> Result<ProfileStore> {
    let store = ProfileStore::load(path)?;
    for (name, config) in &store.profiles {
        config
            .validate()
            .map_err(|e| anyhow!("Profile '{}': {}", name, e))?;
    }
    Ok(store)
}
