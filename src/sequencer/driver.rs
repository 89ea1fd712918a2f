// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Async task that owns the scheduler.
//!
//! The scheduler is only ever touched from this task: wake-ups come from
//! a fixed-period interval and transport commands arrive over a channel,
//! so a pass and a stop can never run at the same time.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::Scheduler;
use crate::audio::SoundDispatch;
use crate::config::PlaybackConfig;
use crate::timing::AudioClock;
use crate::ui::DisplaySink;

/// Commands sent to the scheduler task
#[derive(Debug, Clone)]
pub enum TransportCommand {
    /// Start playing a song
    Start(Box<PlaybackConfig>),
    /// Stop playing
    Stop,
    /// Start if stopped, stop if running
    Toggle(Box<PlaybackConfig>),
    /// Stop and end the task
    Shutdown,
}

/// Transport status published by the scheduler task
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportStatus {
    /// A song is playing
    pub running: bool,
    /// Number of runs started so far
    pub runs: u64,
    /// Number of runs that played to the end
    pub completed: u64,
    /// Why the last start was refused
    pub error: Option<String>,
}

/// Errors sending to the scheduler task
#[derive(Debug, Error)]
pub enum TransportError {
    /// The task has ended
    #[error("scheduler task has shut down")]
    Closed,
    /// The command queue is full
    #[error("scheduler command queue is full")]
    Busy,
}

const COMMAND_QUEUE: usize = 32;

/// Handle for controlling a running scheduler task
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<TransportCommand>,
    status: watch::Receiver<TransportStatus>,
}

impl SchedulerHandle {
    /// Spawn the scheduler onto the current tokio runtime.
    ///
    /// The join handle yields the scheduler back once the task shuts down.
    pub fn spawn<C, S, D>(
        scheduler: Scheduler<C, S, D>,
        wake_interval: Duration,
    ) -> (Self, JoinHandle<Scheduler<C, S, D>>)
    where
        C: AudioClock + Send + 'static,
        S: SoundDispatch + Send + 'static,
        D: DisplaySink + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (status_tx, status_rx) = watch::channel(TransportStatus::default());
        let task = tokio::spawn(run(scheduler, wake_interval, command_rx, status_tx));

        (
            Self {
                commands: command_tx,
                status: status_rx,
            },
            task,
        )
    }

    fn send(&self, command: TransportCommand) -> Result<(), TransportError> {
        self.commands.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Busy,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    /// Start playing `config`
    pub fn start(&self, config: &PlaybackConfig) -> Result<(), TransportError> {
        self.send(TransportCommand::Start(Box::new(config.clone())))
    }

    /// Stop playing
    pub fn stop(&self) -> Result<(), TransportError> {
        self.send(TransportCommand::Stop)
    }

    /// Start if stopped, stop if running
    pub fn toggle(&self, config: &PlaybackConfig) -> Result<(), TransportError> {
        self.send(TransportCommand::Toggle(Box::new(config.clone())))
    }

    /// Stop and end the task
    pub fn shutdown(&self) -> Result<(), TransportError> {
        self.send(TransportCommand::Shutdown)
    }

    /// Latest published status
    pub fn status(&self) -> TransportStatus {
        self.status.borrow().clone()
    }

    /// Check if a song is playing
    pub fn is_running(&self) -> bool {
        self.status.borrow().running
    }

    /// Wait until the status satisfies `condition`
    pub async fn wait_for<F>(&mut self, condition: F) -> Result<TransportStatus, TransportError>
    where
        F: FnMut(&TransportStatus) -> bool,
    {
        self.status
            .wait_for(condition)
            .await
            .map(|status| status.clone())
            .map_err(|_| TransportError::Closed)
    }
}

/// Scheduler task body
pub async fn run<C, S, D>(
    mut scheduler: Scheduler<C, S, D>,
    wake_interval: Duration,
    mut commands: mpsc::Receiver<TransportCommand>,
    status: watch::Sender<TransportStatus>,
) -> Scheduler<C, S, D>
where
    C: AudioClock,
    S: SoundDispatch,
    D: DisplaySink,
{
    let mut ticker = time::interval(wake_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(wake_ms = wake_interval.as_millis() as u64, "scheduler task started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !scheduler.is_running() {
                    continue;
                }
                let pass = scheduler.on_wake();
                if pass.beats > 0 {
                    debug!(beats = pass.beats, dropped = pass.dropped, "scheduling pass");
                }
                if pass.completed {
                    status.send_modify(|s| {
                        s.running = false;
                        s.completed += 1;
                    });
                }
            }
            command = commands.recv() => {
                match command {
                    Some(TransportCommand::Start(config)) => {
                        apply_start(&mut scheduler, &config, &status);
                    }
                    Some(TransportCommand::Toggle(config)) => {
                        if scheduler.is_running() {
                            scheduler.stop();
                        } else {
                            apply_start(&mut scheduler, &config, &status);
                        }
                    }
                    Some(TransportCommand::Stop) => scheduler.stop(),
                    Some(TransportCommand::Shutdown) | None => {
                        scheduler.stop();
                        status.send_modify(|s| s.running = false);
                        break;
                    }
                }
                publish_running(&scheduler, &status);
            }
        }
    }

    info!("scheduler task stopped");
    scheduler
}

fn apply_start<C, S, D>(
    scheduler: &mut Scheduler<C, S, D>,
    config: &PlaybackConfig,
    status: &watch::Sender<TransportStatus>,
) where
    C: AudioClock,
    S: SoundDispatch,
    D: DisplaySink,
{
    if scheduler.is_running() {
        return;
    }
    match scheduler.start(config) {
        Ok(()) => {
            let running = scheduler.is_running();
            status.send_modify(|s| {
                s.runs += 1;
                s.running = running;
                s.error = None;
                // A very short song can finish inside the first pass
                if !running {
                    s.completed += 1;
                }
            });
        }
        Err(e) => {
            warn!(error = %e, "start refused");
            status.send_modify(|s| s.error = Some(e.to_string()));
        }
    }
}

fn publish_running<C, S, D>(scheduler: &Scheduler<C, S, D>, status: &watch::Sender<TransportStatus>)
where
    C: AudioClock,
    S: SoundDispatch,
    D: DisplaySink,
{
    let running = scheduler.is_running();
    status.send_if_modified(|s| {
        if s.running == running {
            false
        } else {
            s.running = running;
            true
        }
    });
}
