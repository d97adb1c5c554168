//! Sync coordinator: the one component a UI talks to.
//!
//! Picks the transport for the current settings, samples it on the poll
//! timer, maps elapsed time onto text segments and republishes a single
//! `TransportState` through a `watch` channel.
//!
//! Custom path:    play → poll every interval → index from time → end at duration
//! Synthesis path: play → Start event → segment timer → End / Error event

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::state::{segment_index_for, TransportState};
use crate::audio::{AudioSource, CustomAudioTransport, OutputFactory};
use crate::clock::AudioClock;
use crate::config::PlaybackConfig;
use crate::error::{Result, SyncError};
use crate::segmenter::segment;
use crate::settings::VoiceSettings;
use crate::synthesis::{SpeechEngine, SynthesisTransport};
use crate::timer::Timer;
use crate::transport::{PlaybackPhase, Transport, TransportEvent, TransportKind};

pub struct SyncCoordinator {
    settings: VoiceSettings,
    playback: PlaybackConfig,
    clock: Arc<dyn AudioClock>,

    text: String,
    segments: Vec<String>,

    synthesis: SynthesisTransport,
    custom: Option<CustomAudioTransport>,
    // Source currently decoded into `custom`
    loaded_source: Option<AudioSource>,
    outputs: OutputFactory,
    // Set when the output device could not be acquired; cleared on configure
    custom_unavailable: bool,

    active: Option<TransportKind>,
    poll_timer: Option<Timer>,
    segment_timer: Option<Timer>,

    state_tx: watch::Sender<TransportState>,
    segments_tx: watch::Sender<Vec<String>>,
    // Runs that played to their natural end
    finished_tx: watch::Sender<u64>,
}

impl SyncCoordinator {
    pub fn new(
        settings: VoiceSettings,
        playback: PlaybackConfig,
        clock: Arc<dyn AudioClock>,
        engine: Box<dyn SpeechEngine>,
        outputs: OutputFactory,
    ) -> Self {
        let synthesis = SynthesisTransport::new(engine, clock.clone(), playback.chars_per_second);
        let (state_tx, _) = watch::channel(TransportState::idle());
        let (segments_tx, _) = watch::channel(Vec::new());
        let (finished_tx, _) = watch::channel(0);
        Self {
            settings,
            playback,
            clock,
            text: String::new(),
            segments: Vec::new(),
            synthesis,
            custom: None,
            loaded_source: None,
            outputs,
            custom_unavailable: false,
            active: None,
            poll_timer: None,
            segment_timer: None,
            state_tx,
            segments_tx,
            finished_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TransportState> {
        self.state_tx.subscribe()
    }

    /// Segments of the current text, republished whenever they change.
    pub fn subscribe_segments(&self) -> watch::Receiver<Vec<String>> {
        self.segments_tx.subscribe()
    }

    /// Count of runs that reached their end; stop, replay and text changes
    /// never bump it.
    pub fn subscribe_finished(&self) -> watch::Receiver<u64> {
        self.finished_tx.subscribe()
    }

    pub fn finished_runs(&self) -> u64 {
        *self.finished_tx.borrow()
    }

    pub fn state(&self) -> TransportState {
        *self.state_tx.borrow()
    }

    pub fn settings(&self) -> &VoiceSettings {
        &self.settings
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Transport the next `play()` will use.
    pub fn selected_transport(&self) -> TransportKind {
        if self.settings.wants_custom_audio() && !self.custom_unavailable {
            TransportKind::CustomAudio
        } else {
            TransportKind::Synthesis
        }
    }

    /// Transport currently playing or paused, if any.
    pub fn active_transport(&self) -> Option<TransportKind> {
        self.active
    }

    /// Replace the settings snapshot.
    ///
    /// An in-flight run keeps going; new rate and pitch apply from the next
    /// `play()`.
    pub fn configure(&mut self, settings: VoiceSettings) {
        let resegment = settings.sync_with_text != self.settings.sync_with_text;
        self.settings = settings;
        self.custom_unavailable = false;
        if resegment {
            self.resegment();
        }
        if self.active.is_none() {
            self.synthesis.prepare(&self.text, &self.settings);
            self.release_unused_custom();
        }
        debug!(
            "Configured: {} / {:?} / {:?}, sync {}",
            self.settings.voice_type.label(),
            self.settings.speed,
            self.settings.tone,
            self.settings.sync_with_text
        );
    }

    /// Replace the text. Playback stops and segments are recomputed.
    pub fn set_text(&mut self, text: &str) {
        self.stop();
        self.text = text.to_string();
        self.resegment();
        self.synthesis.prepare(&self.text, &self.settings);
        info!("Text set: {} chars, {} segments", self.text.chars().count(), self.segments.len());
    }

    fn resegment(&mut self) {
        self.segments = if self.settings.sync_with_text {
            segment(&self.text)
        } else {
            Vec::new()
        };
        self.segments_tx.send_replace(self.segments.clone());
    }

    /// Give the output device back once custom audio is no longer wanted.
    fn release_unused_custom(&mut self) {
        if self.settings.wants_custom_audio() {
            return;
        }
        if let Some(mut custom) = self.custom.take() {
            custom.dispose();
            self.loaded_source = None;
            info!("Custom voice released");
        }
    }

    /// Start playback, or continue if paused.
    pub async fn play(&mut self) -> Result<()> {
        if !self.settings.enabled {
            debug!("Voice disabled; play() ignored");
            return Ok(());
        }
        if self.state().is_paused {
            return self.resume();
        }

        match self.selected_transport() {
            TransportKind::CustomAudio => self.play_custom().await,
            TransportKind::Synthesis => self.play_synthesis(),
        }
    }

    async fn play_custom(&mut self) -> Result<()> {
        let Some(source) = self.settings.custom_source().cloned() else {
            return self.play_synthesis();
        };

        if self.custom.is_none() {
            match (self.outputs)() {
                Ok(output) => {
                    self.custom = Some(CustomAudioTransport::new(output, self.clock.clone()));
                }
                Err(SyncError::ResourceUnavailable(reason)) => {
                    warn!("Custom voice unavailable ({reason}), falling back to synthesis");
                    self.custom_unavailable = true;
                    return self.play_synthesis();
                }
                Err(e) => return Err(e),
            }
        }

        self.sweep_timers();
        self.synthesis.stop();
        let Some(custom) = self.custom.as_mut() else {
            return Ok(());
        };

        if self.loaded_source.as_ref() != Some(&source) {
            self.loaded_source = None;
            if let Err(e) = custom.load(&source).await {
                self.active = None;
                self.publish(|state| *state = TransportState::idle());
                return Err(e);
            }
            self.loaded_source = Some(source);
        }

        let offset = match custom.phase() {
            PlaybackPhase::Playing => 0.0,
            _ => custom.cued_offset(),
        };
        custom.play(offset)?;

        let current_time = custom.current_time();
        let duration = custom.duration();
        let index = segment_index_for(current_time, duration, self.segments.len());
        self.active = Some(TransportKind::CustomAudio);
        self.poll_timer = Timer::repeating(self.playback.poll_interval_secs(), self.clock.now());
        self.publish(|state| {
            *state = TransportState {
                is_playing: true,
                is_paused: false,
                current_time,
                duration,
                current_segment_index: index,
            }
        });
        info!("Playing custom voice ({duration:.2}s)");
        Ok(())
    }

    fn play_synthesis(&mut self) -> Result<()> {
        if self.text.trim().is_empty() {
            debug!("Nothing to speak");
            return Ok(());
        }

        self.sweep_timers();
        if let Some(custom) = self.custom.as_mut() {
            custom.stop();
        }
        self.release_unused_custom();
        self.synthesis.stop();
        self.synthesis.prepare(&self.text, &self.settings);

        if let Err(e) = self.synthesis.play(0.0) {
            self.active = None;
            self.publish(|state| *state = TransportState::idle());
            return Err(e);
        }

        // Playing is reported once the engine starts speaking
        let duration = self.synthesis.duration();
        self.active = Some(TransportKind::Synthesis);
        self.publish(|state| {
            *state = TransportState {
                duration,
                ..TransportState::idle()
            }
        });
        info!("Speaking {} chars (~{duration:.2}s)", self.text.chars().count());
        Ok(())
    }

    pub fn pause(&mut self) {
        let Some(kind) = self.active else {
            return;
        };
        let now = self.clock.now();
        let transport = self.transport_mut(kind);
        transport.pause();
        if transport.phase() != PlaybackPhase::Paused {
            return;
        }
        let current_time = transport.current_time();

        if let Some(timer) = self.segment_timer.as_mut() {
            timer.suspend(now);
        }
        self.publish(|state| {
            state.is_playing = false;
            state.is_paused = true;
            state.current_time = current_time;
        });
        info!("Paused at {current_time:.2}s");
    }

    pub fn resume(&mut self) -> Result<()> {
        let Some(kind) = self.active else {
            return Ok(());
        };
        let now = self.clock.now();
        let transport = self.transport_mut(kind);
        if transport.phase() != PlaybackPhase::Paused {
            return Ok(());
        }
        transport.resume()?;

        if let Some(timer) = self.segment_timer.as_mut() {
            timer.resume(now);
        }
        self.publish(|state| {
            state.is_playing = true;
            state.is_paused = false;
        });
        info!("Resumed");
        Ok(())
    }

    /// Stop both transports and return to idle. Idempotent.
    pub fn stop(&mut self) {
        self.sweep_timers();
        if let Some(custom) = self.custom.as_mut() {
            custom.stop();
        }
        self.synthesis.stop();
        if self.active.take().is_some() {
            info!("Stopped");
        }
        self.publish(|state| *state = TransportState::idle());
    }

    /// Move the playhead of the active (or next) transport.
    ///
    /// Transports that cannot seek return `SeekUnsupported` and nothing changes.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        let kind = self.active.unwrap_or_else(|| self.selected_transport());
        if kind == TransportKind::CustomAudio && self.custom.is_none() {
            debug!("Seek before the custom voice was loaded; ignoring");
            return Ok(());
        }

        let transport = self.transport_mut(kind);
        if !transport.supports_seek() {
            warn!("Seek unavailable on the {kind} transport");
            return Err(SyncError::SeekUnsupported);
        }
        transport.seek(seconds)?;
        let current_time = transport.current_time();
        let duration = transport.duration();

        if self.active.is_some() {
            let index = segment_index_for(current_time, duration, self.segments.len());
            self.publish(|state| {
                state.current_time = current_time;
                state.current_segment_index = index;
            });
        }
        Ok(())
    }

    /// Stop, then play from the beginning.
    pub async fn replay(&mut self) -> Result<()> {
        self.stop();
        self.play().await
    }

    /// Drain transport events and advance timers.
    ///
    /// Returns the failure reported by the speech engine, if any; the
    /// coordinator is idle by then.
    pub fn tick(&mut self) -> Result<()> {
        match self.active {
            Some(TransportKind::CustomAudio) => {
                self.tick_custom();
                Ok(())
            }
            Some(TransportKind::Synthesis) => self.tick_synthesis(),
            None => Ok(()),
        }
    }

    fn tick_custom(&mut self) {
        let now = self.clock.now();
        let due = self.poll_timer.as_mut().map_or(0, |timer| timer.poll(now));
        if due == 0 {
            return;
        }
        let Some(custom) = self.custom.as_mut() else {
            return;
        };

        let duration = custom.duration();
        if let Some(TransportEvent::Finished) = custom.poll_event() {
            self.poll_timer = None;
            self.active = None;
            self.publish(|state| {
                *state = TransportState {
                    current_time: duration,
                    duration,
                    ..TransportState::idle()
                }
            });
            self.finished_tx.send_modify(|runs| *runs += 1);
            info!("Custom voice finished");
            return;
        }

        if custom.phase() != PlaybackPhase::Playing {
            return;
        }
        let current_time = custom.current_time();
        let index = segment_index_for(current_time, duration, self.segments.len());
        self.publish(|state| {
            state.current_time = current_time;
            state.duration = duration;
            state.current_segment_index = index;
        });
    }

    fn tick_synthesis(&mut self) -> Result<()> {
        let now = self.clock.now();

        while let Some(event) = self.synthesis.poll_event() {
            match event {
                TransportEvent::Started => {
                    let duration = self.synthesis.duration();
                    let count = self.segments.len();
                    self.segment_timer = Timer::counted(duration / count as f64, count, now);
                    self.poll_timer = Timer::repeating(self.playback.poll_interval_secs(), now);
                    self.publish(|state| {
                        state.is_playing = true;
                        state.is_paused = false;
                        state.duration = duration;
                    });
                    info!("Speech started");
                }
                TransportEvent::Finished => {
                    self.sweep_timers();
                    self.active = None;
                    self.publish(|state| {
                        state.is_playing = false;
                        state.is_paused = false;
                        state.current_time = state.duration;
                        state.current_segment_index = -1;
                    });
                    self.finished_tx.send_modify(|runs| *runs += 1);
                    info!("Speech finished");
                    return Ok(());
                }
                TransportEvent::Failed(e) => {
                    self.sweep_timers();
                    self.active = None;
                    self.publish(|state| {
                        state.is_playing = false;
                        state.is_paused = false;
                        state.current_segment_index = -1;
                    });
                    return Err(e);
                }
            }
        }

        if let Some(timer) = self.segment_timer.as_mut() {
            if timer.poll(now) > 0 {
                let index = timer.fired() as i32 - 1;
                debug!("Segment timer: index {index}");
                self.publish(|state| state.current_segment_index = index);
            }
        }

        let sampled = self.poll_timer.as_mut().is_some_and(|timer| timer.poll(now) > 0);
        if sampled && self.synthesis.phase() == PlaybackPhase::Playing {
            let current_time = self.synthesis.current_time();
            self.publish(|state| state.current_time = current_time);
        }
        Ok(())
    }

    /// Stop playback and release the audio output.
    pub fn dispose(&mut self) {
        self.stop();
        if let Some(mut custom) = self.custom.take() {
            custom.dispose();
        }
        self.loaded_source = None;
    }

    fn transport_mut(&mut self, kind: TransportKind) -> &mut dyn Transport {
        match (kind, self.custom.as_mut()) {
            (TransportKind::CustomAudio, Some(custom)) => custom as &mut dyn Transport,
            _ => &mut self.synthesis,
        }
    }

    fn sweep_timers(&mut self) {
        self.poll_timer = None;
        self.segment_timer = None;
    }

    fn publish(&self, update: impl FnOnce(&mut TransportState)) {
        self.state_tx.send_if_modified(|state| {
            let before = *state;
            update(state);
            *state != before
        });
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        self.dispose();
    }
}
