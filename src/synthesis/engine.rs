//! Speech engine abstraction and the utterance handed to it.

use tokio::sync::mpsc::UnboundedSender;

use crate::error::Result;
use crate::settings::{effective_pitch, effective_rate, VoiceSettings, VoiceType};

/// Text plus the voice parameters derived from settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub lang: &'static str,
    pub voice_type: VoiceType,
    /// Rate multiplier, 1.0 = engine default.
    pub rate: f32,
    /// Pitch multiplier, 1.0 = engine default.
    pub pitch: f32,
    pub volume: f32,
}

impl Utterance {
    /// Build an utterance for `text`, applying the custom-voice failover.
    pub fn new(text: &str, settings: &VoiceSettings) -> Self {
        let settings = settings.resolved_for_playback();
        Self {
            text: text.to_string(),
            lang: "zh-CN",
            voice_type: settings.voice_type,
            rate: effective_rate(&settings),
            pitch: effective_pitch(&settings),
            volume: 1.0,
        }
    }

    /// Platform voice names to try for this utterance.
    pub fn preferred_voices(&self) -> &'static [&'static str] {
        self.voice_type.preferred_voices()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEventKind {
    Start,
    End,
    Error(String),
}

/// Callback from the engine, tagged with the utterance it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechEvent {
    pub utterance: u64,
    pub kind: SpeechEventKind,
}

/// A platform speech engine.
///
/// Engines report progress only through `events`; they never call back into
/// the transport. After `cancel()` an engine may still deliver stale events,
/// which the transport discards by utterance id.
pub trait SpeechEngine {
    /// Begin speaking. Returns an error only if the request could not be
    /// submitted at all; failures during speech arrive as `Error` events.
    fn speak(&mut self, id: u64, utterance: &Utterance, events: UnboundedSender<SpeechEvent>)
        -> Result<()>;

    fn pause(&mut self);

    fn resume(&mut self);

    fn cancel(&mut self);
}
