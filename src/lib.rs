//! read-aloud: voice playback synchronized with sentence highlighting.
//!
//! Text is split into sentence segments, read aloud either from a custom
//! voice recording or through speech synthesis, and the segment being spoken
//! is published continuously through a single `TransportState`.

pub mod audio;
pub mod clock;
pub mod config;
pub mod error;
pub mod segmenter;
pub mod settings;
pub mod store;
pub mod sync;
pub mod synthesis;
pub mod timer;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, SyncError};
pub use sync::{SyncCoordinator, SyncSession, TransportState};
