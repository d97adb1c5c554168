//! Custom voice playback: source decoding, output device, transport.

pub mod output;
pub mod player;
pub mod source;

pub use output::{default_output_factory, AudioOutput, OutputFactory, RodioOutput};
pub use player::CustomAudioTransport;
pub use source::{decode_bytes, load, AudioSource, DecodedAudio};
