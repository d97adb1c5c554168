//! Synthesis transport: one utterance behind the shared transport contract.
//!
//! The engine only reports start/end/error, so progress is estimated: the
//! duration comes from a characters-per-second heuristic and elapsed time
//! from the same anchored playhead the custom audio transport uses. Seeking
//! is not possible.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use super::engine::{SpeechEngine, SpeechEvent, SpeechEventKind, Utterance};
use crate::clock::{AudioClock, PlaybackClock};
use crate::error::{Result, SyncError};
use crate::settings::VoiceSettings;
use crate::transport::{ClockAccuracy, PlaybackPhase, Transport, TransportEvent, TransportKind};

/// Characters read per second by the duration estimate.
pub const DEFAULT_CHARS_PER_SECOND: f64 = 100.0;

/// Estimated speaking time for `text`, in seconds.
pub fn estimate_duration(text: &str, chars_per_second: f64) -> f64 {
    if chars_per_second <= 0.0 {
        return 0.0;
    }
    text.chars().count() as f64 / chars_per_second
}

pub struct SynthesisTransport {
    engine: Box<dyn SpeechEngine>,
    clock: Arc<dyn AudioClock>,
    utterance: Option<Utterance>,
    chars_per_second: f64,

    events_tx: UnboundedSender<SpeechEvent>,
    events_rx: UnboundedReceiver<SpeechEvent>,
    // Id of the utterance whose events are still meaningful
    current: u64,

    phase: PlaybackPhase,
    playhead: PlaybackClock,
}

impl SynthesisTransport {
    pub fn new(engine: Box<dyn SpeechEngine>, clock: Arc<dyn AudioClock>, chars_per_second: f64) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            engine,
            clock,
            utterance: None,
            chars_per_second,
            events_tx,
            events_rx,
            current: 0,
            phase: PlaybackPhase::Idle,
            playhead: PlaybackClock::default(),
        }
    }

    /// Set the utterance the next `play()` will speak.
    ///
    /// An utterance already being spoken keeps its original parameters.
    pub fn prepare(&mut self, text: &str, settings: &VoiceSettings) {
        self.utterance = Some(Utterance::new(text, settings));
    }

    pub fn utterance(&self) -> Option<&Utterance> {
        self.utterance.as_ref()
    }

    fn set_idle(&mut self) {
        self.playhead.reset();
        self.phase = PlaybackPhase::Idle;
    }
}

impl Transport for SynthesisTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Synthesis
    }

    fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    /// Speak the prepared utterance. The offset is ignored: synthesis always
    /// starts at the beginning.
    fn play(&mut self, _offset: f64) -> Result<()> {
        if self.phase == PlaybackPhase::Paused {
            return self.resume();
        }
        let Some(utterance) = self.utterance.clone() else {
            debug!("play() without a prepared utterance; ignoring");
            return Ok(());
        };

        if self.phase != PlaybackPhase::Idle {
            self.engine.cancel();
        }
        self.current += 1;
        self.playhead.reset();

        if let Err(e) = self.engine.speak(self.current, &utterance, self.events_tx.clone()) {
            warn!("Speech engine rejected utterance #{}: {e}", self.current);
            self.set_idle();
            return Err(match e {
                SyncError::Synthesis(_) => e,
                other => SyncError::Synthesis(other.to_string()),
            });
        }

        // Playing once the engine reports Start
        self.phase = PlaybackPhase::Loading;
        info!(
            "Utterance #{} submitted (rate {:.2}, pitch {:.2})",
            self.current, utterance.rate, utterance.pitch
        );
        Ok(())
    }

    fn pause(&mut self) {
        if self.phase != PlaybackPhase::Playing {
            return;
        }
        self.engine.pause();
        let at = self.playhead.freeze(self.clock.now());
        self.phase = PlaybackPhase::Paused;
        info!("Utterance #{} paused at ~{at:.2}s", self.current);
    }

    fn resume(&mut self) -> Result<()> {
        if self.phase != PlaybackPhase::Paused {
            return Ok(());
        }
        self.engine.resume();
        self.playhead.resume(self.clock.now());
        self.phase = PlaybackPhase::Playing;
        info!("Utterance #{} resumed", self.current);
        Ok(())
    }

    fn stop(&mut self) {
        if self.phase != PlaybackPhase::Idle {
            self.engine.cancel();
            // Late events from the cancelled utterance are discarded
            self.current += 1;
        }
        self.set_idle();
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        warn!("Seek to {seconds:.2}s ignored: synthesis playback cannot seek");
        Err(SyncError::SeekUnsupported)
    }

    fn supports_seek(&self) -> bool {
        false
    }

    fn clock_accuracy(&self) -> ClockAccuracy {
        ClockAccuracy::Estimated
    }

    fn current_time(&self) -> f64 {
        match self.phase {
            PlaybackPhase::Playing | PlaybackPhase::Paused => self
                .playhead
                .position(self.clock.now())
                .min(self.duration()),
            _ => 0.0,
        }
    }

    fn duration(&self) -> f64 {
        self.utterance
            .as_ref()
            .map_or(0.0, |u| estimate_duration(&u.text, self.chars_per_second))
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        while let Ok(event) = self.events_rx.try_recv() {
            if event.utterance != self.current {
                debug!("Dropping stale event from utterance #{}", event.utterance);
                continue;
            }
            match event.kind {
                SpeechEventKind::Start => {
                    if self.phase != PlaybackPhase::Loading {
                        continue;
                    }
                    self.playhead.start(self.clock.now(), 0.0);
                    self.phase = PlaybackPhase::Playing;
                    return Some(TransportEvent::Started);
                }
                SpeechEventKind::End => {
                    info!("Utterance #{} finished", self.current);
                    self.set_idle();
                    return Some(TransportEvent::Finished);
                }
                SpeechEventKind::Error(message) => {
                    warn!("Utterance #{} failed: {message}", self.current);
                    self.set_idle();
                    return Some(TransportEvent::Failed(SyncError::Synthesis(message)));
                }
            }
        }
        None
    }
}

impl Drop for SynthesisTransport {
    fn drop(&mut self) {
        self.stop();
    }
}
