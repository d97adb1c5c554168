//! Error taxonomy for the playback engine.
//!
//! Every transport failure resolves to a defined transport state before it is
//! returned; nothing in the engine retries on its own.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Audio source could not be read or its format is not supported.
    #[error("failed to decode audio source: {0}")]
    Decode(String),

    /// The speech engine reported a failure for the active utterance.
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    /// The active transport cannot seek (synthesis path).
    #[error("seek is unavailable for the active transport")]
    SeekUnsupported,

    /// The audio output device could not be acquired.
    #[error("audio resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
