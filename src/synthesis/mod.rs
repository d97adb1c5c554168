//! Speech synthesis playback.

pub mod engine;
pub mod espeak;
pub mod transport;

pub use engine::{SpeechEngine, SpeechEvent, SpeechEventKind, Utterance};
pub use espeak::EspeakEngine;
pub use transport::{estimate_duration, SynthesisTransport, DEFAULT_CHARS_PER_SECOND};
