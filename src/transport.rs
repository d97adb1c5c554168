//! The transport contract shared by both playback backends.
//!
//! Callers branch on capabilities (`supports_seek`, `clock_accuracy`)
//! instead of on which backend is active.

use std::fmt;

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    CustomAudio,
    Synthesis,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CustomAudio => write!(f, "custom-audio"),
            Self::Synthesis => write!(f, "synthesis"),
        }
    }
}

/// Lifecycle of a transport.
///
/// `Ready` means the transport holds playable material but is not running;
/// it is also where a loaded transport lands after `stop()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Loading => write!(f, "LOADING"),
            Self::Ready => write!(f, "READY"),
            Self::Playing => write!(f, "PLAYING"),
            Self::Paused => write!(f, "PAUSED"),
        }
    }
}

/// How far `current_time()` can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockAccuracy {
    /// Read from the audio clock against a decoded buffer.
    SampleAccurate,
    /// Derived from a duration heuristic and coarse engine events.
    Estimated,
}

/// Asynchronous notifications drained from a transport on each tick.
#[derive(Debug)]
pub enum TransportEvent {
    Started,
    Finished,
    Failed(SyncError),
}

pub trait Transport {
    fn kind(&self) -> TransportKind;

    fn phase(&self) -> PlaybackPhase;

    /// Start a new run from `offset` seconds, or resume if paused.
    fn play(&mut self, offset: f64) -> Result<()>;

    fn pause(&mut self);

    fn resume(&mut self) -> Result<()>;

    /// Tear down playback. Idempotent.
    fn stop(&mut self);

    /// Move the playhead. Transports without seek return `SeekUnsupported`
    /// and leave their state untouched.
    fn seek(&mut self, seconds: f64) -> Result<()>;

    fn supports_seek(&self) -> bool;

    fn clock_accuracy(&self) -> ClockAccuracy;

    fn current_time(&self) -> f64;

    fn duration(&self) -> f64;

    /// Next pending event, if any.
    fn poll_event(&mut self) -> Option<TransportEvent>;
}
