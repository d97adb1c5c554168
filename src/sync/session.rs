//! Session driver: owns the coordinator and runs it on a tick loop.
//!
//! Commands arrive over an mpsc channel; between commands the loop ticks the
//! coordinator so engine events and timers advance. State reaches observers
//! through the coordinator's `watch` channel.

use std::str::FromStr;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::coordinator::SyncCoordinator;
use super::state::TransportState;
use crate::error::{Result, SyncError};
use crate::settings::VoiceSettings;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Configure(VoiceSettings),
    /// Switch subject; applies its voice profile when auto-adjust is on.
    SetSubject(String),
    SetText(String),
    Play,
    Pause,
    Resume,
    Stop,
    Seek(f64),
    Replay,
    Shutdown,
}

impl FromStr for Command {
    type Err = SyncError;

    /// Parse an interactive command line such as `seek 12.5` or `subject math`.
    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let command = match word {
            "play" => Command::Play,
            "pause" | "p" => Command::Pause,
            "resume" | "r" => Command::Resume,
            "stop" | "s" => Command::Stop,
            "replay" => Command::Replay,
            "quit" | "q" | "exit" => Command::Shutdown,
            "seek" => {
                let seconds = rest
                    .parse::<f64>()
                    .map_err(|_| SyncError::Config(format!("seek needs seconds, got {rest:?}")))?;
                Command::Seek(seconds)
            }
            "subject" if !rest.is_empty() => Command::SetSubject(rest.to_string()),
            "text" if !rest.is_empty() => Command::SetText(rest.to_string()),
            _ => return Err(SyncError::Config(format!("unknown command: {line:?}"))),
        };
        Ok(command)
    }
}

/// Cloneable handle to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<TransportState>,
    segments: watch::Receiver<Vec<String>>,
    finished: watch::Receiver<u64>,
}

impl SessionHandle {
    pub async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SyncError::ResourceUnavailable("session has shut down".into()))
    }

    /// A fresh receiver for state updates.
    pub fn subscribe(&self) -> watch::Receiver<TransportState> {
        self.state.clone()
    }

    pub fn state(&self) -> TransportState {
        *self.state.borrow()
    }

    /// Segments of the current text; changes with every `SetText`.
    pub fn subscribe_segments(&self) -> watch::Receiver<Vec<String>> {
        self.segments.clone()
    }

    /// Ticks once per run that plays to its end.
    pub fn subscribe_finished(&self) -> watch::Receiver<u64> {
        self.finished.clone()
    }
}

pub struct SyncSession {
    coordinator: SyncCoordinator,
    commands: mpsc::Receiver<Command>,
    tick_interval: Duration,
    errors: Option<mpsc::UnboundedSender<SyncError>>,
}

impl SyncSession {
    pub fn new(coordinator: SyncCoordinator, tick_interval: Duration) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let handle = SessionHandle {
            commands: command_tx,
            state: coordinator.subscribe(),
            segments: coordinator.subscribe_segments(),
            finished: coordinator.subscribe_finished(),
        };
        let session = Self {
            coordinator,
            commands: command_rx,
            tick_interval,
            errors: None,
        };
        (session, handle)
    }

    /// Forward command and engine failures to `errors` as well as the log.
    pub fn with_error_sink(mut self, errors: mpsc::UnboundedSender<SyncError>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(self.tick_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!("Session ready");

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Shutdown) => {
                            info!("Shutdown requested");
                            break;
                        }
                        Some(command) => {
                            if let Err(e) = self.handle(command).await {
                                self.report(e);
                            }
                        }
                        None => {
                            debug!("All session handles dropped");
                            break;
                        }
                    }
                }
                _ = tick.tick() => {
                    if let Err(e) = self.coordinator.tick() {
                        self.report(e);
                    }
                }
            }
        }

        self.coordinator.dispose();
        info!("Session closed");
    }

    async fn handle(&mut self, command: Command) -> Result<()> {
        debug!("Command: {command:?}");
        match command {
            Command::Configure(settings) => self.coordinator.configure(settings),
            Command::SetSubject(subject) => {
                let settings = self.coordinator.settings().apply_subject(&subject);
                if &settings != self.coordinator.settings() {
                    info!("Subject {subject}: voice {}", settings.voice_type.label());
                }
                self.coordinator.configure(settings);
            }
            Command::SetText(text) => self.coordinator.set_text(&text),
            Command::Play => self.coordinator.play().await?,
            Command::Pause => self.coordinator.pause(),
            Command::Resume => self.coordinator.resume()?,
            Command::Stop => self.coordinator.stop(),
            Command::Seek(seconds) => self.coordinator.seek(seconds)?,
            Command::Replay => self.coordinator.replay().await?,
            Command::Shutdown => {}
        }
        Ok(())
    }

    fn report(&self, error: SyncError) {
        warn!("{error}");
        if let Some(errors) = &self.errors {
            let _ = errors.send(error);
        }
    }
}
