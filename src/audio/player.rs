//! Custom voice transport: a decoded buffer played against the audio clock.
//!
//! IDLE → LOADING → READY → PLAYING ⇄ PAUSED → READY (stopped)

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::output::AudioOutput;
use super::source::{self, AudioSource, DecodedAudio};
use crate::clock::{AudioClock, PlaybackClock};
use crate::error::{Result, SyncError};
use crate::transport::{ClockAccuracy, PlaybackPhase, Transport, TransportEvent, TransportKind};

pub struct CustomAudioTransport {
    /// Held from construction until `dispose()`.
    output: Option<Box<dyn AudioOutput>>,
    clock: Arc<dyn AudioClock>,
    audio: Option<DecodedAudio>,
    phase: PlaybackPhase,
    playhead: PlaybackClock,
}

impl CustomAudioTransport {
    pub fn new(output: Box<dyn AudioOutput>, clock: Arc<dyn AudioClock>) -> Self {
        Self {
            output: Some(output),
            clock,
            audio: None,
            phase: PlaybackPhase::Idle,
            playhead: PlaybackClock::default(),
        }
    }

    /// Decode `source` and become `Ready`.
    ///
    /// On failure the previous buffer is gone and the transport is `Idle`.
    pub async fn load(&mut self, source: &AudioSource) -> Result<()> {
        self.ensure_output()?;
        self.stop();
        self.audio = None;
        self.phase = PlaybackPhase::Loading;

        match source::load(source).await {
            Ok(audio) => {
                self.load_decoded(audio);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load custom voice: {e}");
                self.phase = PlaybackPhase::Idle;
                Err(e)
            }
        }
    }

    /// Take an already-decoded buffer and become `Ready`.
    pub fn load_decoded(&mut self, audio: DecodedAudio) {
        self.stop();
        info!(
            "Custom voice ready: {:.2}s, {} ch @ {}Hz",
            audio.duration(),
            audio.channels(),
            audio.sample_rate()
        );
        self.audio = Some(audio);
        self.playhead.reset();
        self.phase = PlaybackPhase::Ready;
    }

    /// Offset a stopped transport will start from (set by `seek` while stopped).
    pub fn cued_offset(&self) -> f64 {
        if self.playhead.is_running() {
            0.0
        } else {
            self.playhead.offset()
        }
    }

    /// Stop playback and give the output device back.
    pub fn dispose(&mut self) {
        self.stop();
        if let Some(mut output) = self.output.take() {
            output.release();
            debug!("Custom audio transport disposed");
        }
        self.audio = None;
        self.phase = PlaybackPhase::Idle;
    }

    fn ensure_output(&self) -> Result<()> {
        if self.output.is_none() {
            return Err(SyncError::ResourceUnavailable("audio output was disposed".into()));
        }
        Ok(())
    }

    fn start_run(&mut self, offset: f64) -> Result<()> {
        let (Some(audio), Some(output)) = (self.audio.as_ref(), self.output.as_mut()) else {
            return Err(SyncError::ResourceUnavailable("audio output was disposed".into()));
        };
        output.halt();
        output.start(audio, offset);
        self.playhead.start(self.clock.now(), offset);
        Ok(())
    }
}

impl Transport for CustomAudioTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::CustomAudio
    }

    fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    fn play(&mut self, offset: f64) -> Result<()> {
        if self.phase == PlaybackPhase::Paused {
            return self.resume();
        }
        if self.audio.is_none() {
            debug!("play() before a custom voice is loaded; ignoring");
            return Ok(());
        }

        let offset = offset.clamp(0.0, self.duration());
        self.start_run(offset)?;
        self.phase = PlaybackPhase::Playing;
        info!("Custom voice playing from {offset:.2}s");
        Ok(())
    }

    fn pause(&mut self) {
        if self.phase != PlaybackPhase::Playing {
            return;
        }
        let offset = self.playhead.freeze(self.clock.now());
        if let Some(output) = self.output.as_mut() {
            output.halt();
        }
        self.phase = PlaybackPhase::Paused;
        info!("Custom voice paused at {offset:.2}s");
    }

    fn resume(&mut self) -> Result<()> {
        if self.phase != PlaybackPhase::Paused {
            return Ok(());
        }
        let offset = self.playhead.offset();
        self.start_run(offset)?;
        self.phase = PlaybackPhase::Playing;
        info!("Custom voice resumed at {offset:.2}s");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(output) = self.output.as_mut() {
            output.halt();
        }
        self.playhead.reset();
        self.phase = if self.audio.is_some() {
            PlaybackPhase::Ready
        } else {
            PlaybackPhase::Idle
        };
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        let target = seconds.clamp(0.0, self.duration());
        match self.phase {
            PlaybackPhase::Playing => {
                // Restarting the run may leave a short audible gap
                self.start_run(target)?;
            }
            _ => self.playhead.cue(target),
        }
        debug!("Seek to {target:.2}s ({})", self.phase);
        Ok(())
    }

    fn supports_seek(&self) -> bool {
        true
    }

    fn clock_accuracy(&self) -> ClockAccuracy {
        ClockAccuracy::SampleAccurate
    }

    fn current_time(&self) -> f64 {
        match self.phase {
            PlaybackPhase::Playing | PlaybackPhase::Paused => {
                self.playhead.position(self.clock.now())
            }
            _ => 0.0,
        }
    }

    fn duration(&self) -> f64 {
        self.audio.as_ref().map_or(0.0, DecodedAudio::duration)
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        let duration = self.duration();
        if self.phase == PlaybackPhase::Playing && duration > 0.0 && self.current_time() >= duration {
            info!("Custom voice reached the end ({duration:.2}s)");
            self.stop();
            return Some(TransportEvent::Finished);
        }
        None
    }
}

impl Drop for CustomAudioTransport {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::{wav_bytes, OutputCall, RecordingOutput};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn loaded(duration: f64) -> (CustomAudioTransport, Arc<ManualClock>, RecordingOutput) {
        let clock = Arc::new(ManualClock::new());
        let output = RecordingOutput::default();
        let mut transport = CustomAudioTransport::new(Box::new(output.clone()), clock.clone());
        let frames = (duration * 100.0) as usize;
        transport.load_decoded(DecodedAudio::new(vec![0.0; frames], 1, 100));
        (transport, clock, output)
    }

    #[test]
    fn play_before_load_is_a_noop() {
        let clock = Arc::new(ManualClock::new());
        let output = RecordingOutput::default();
        let mut transport = CustomAudioTransport::new(Box::new(output.clone()), clock);
        transport.play(0.0).unwrap();
        assert_eq!(transport.phase(), PlaybackPhase::Idle);
        assert_eq!(transport.duration(), 0.0);
        assert!(output.calls().is_empty());
    }

    #[test]
    fn pause_and_resume_keep_elapsed_time_continuous() {
        let (mut transport, clock, _) = loaded(10.0);
        transport.play(0.0).unwrap();
        clock.advance(3.0);
        transport.pause();
        assert_eq!(transport.phase(), PlaybackPhase::Paused);
        assert!(approx(transport.current_time(), 3.0));

        clock.advance(120.0);
        assert!(approx(transport.current_time(), 3.0));

        transport.resume().unwrap();
        clock.advance(2.0);
        assert_eq!(transport.phase(), PlaybackPhase::Playing);
        assert!(approx(transport.current_time(), 5.0));
    }

    #[test]
    fn resume_restarts_output_at_pause_offset() {
        let (mut transport, clock, output) = loaded(10.0);
        transport.play(0.0).unwrap();
        clock.advance(4.0);
        transport.pause();
        transport.resume().unwrap();
        let starts: Vec<f64> = output
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                OutputCall::Start(offset) => Some(offset),
                _ => None,
            })
            .collect();
        assert_eq!(starts.len(), 2);
        assert!(approx(starts[1], 4.0));
    }

    #[test]
    fn play_while_paused_resumes() {
        let (mut transport, clock, _) = loaded(10.0);
        transport.play(0.0).unwrap();
        clock.advance(2.0);
        transport.pause();
        transport.play(0.0).unwrap();
        clock.advance(1.0);
        assert!(approx(transport.current_time(), 3.0));
    }

    #[test]
    fn pause_outside_playing_is_a_noop() {
        let (mut transport, _, output) = loaded(5.0);
        let before = output.calls().len();
        transport.pause();
        assert_eq!(transport.phase(), PlaybackPhase::Ready);
        assert_eq!(output.calls().len(), before);
    }

    #[test]
    fn seek_clamps_to_buffer() {
        let (mut transport, _, _) = loaded(10.0);
        transport.play(0.0).unwrap();
        transport.seek(-5.0).unwrap();
        assert!(approx(transport.current_time(), 0.0));
        transport.seek(110.0).unwrap();
        assert!(approx(transport.current_time(), 10.0));
    }

    #[test]
    fn seek_while_paused_only_moves_offset() {
        let (mut transport, clock, output) = loaded(10.0);
        transport.play(0.0).unwrap();
        clock.advance(1.0);
        transport.pause();
        let before = output.calls().len();
        transport.seek(6.0).unwrap();
        assert_eq!(output.calls().len(), before);
        assert_eq!(transport.phase(), PlaybackPhase::Paused);
        assert!(approx(transport.current_time(), 6.0));
        transport.resume().unwrap();
        clock.advance(1.0);
        assert!(approx(transport.current_time(), 7.0));
    }

    #[test]
    fn seek_while_stopped_cues_next_play() {
        let (mut transport, _, _) = loaded(10.0);
        transport.seek(4.0).unwrap();
        assert_eq!(transport.phase(), PlaybackPhase::Ready);
        assert!(approx(transport.cued_offset(), 4.0));
        transport.play(transport.cued_offset()).unwrap();
        assert!(approx(transport.current_time(), 4.0));
    }

    #[test]
    fn stop_is_idempotent() {
        let (mut transport, clock, _) = loaded(10.0);
        transport.play(0.0).unwrap();
        clock.advance(2.0);
        transport.stop();
        let once = (transport.phase(), transport.current_time());
        transport.stop();
        assert_eq!((transport.phase(), transport.current_time()), once);
        assert_eq!(once, (PlaybackPhase::Ready, 0.0));
    }

    #[test]
    fn reaching_the_end_reports_finished() {
        let (mut transport, clock, _) = loaded(2.0);
        transport.play(0.0).unwrap();
        clock.advance(1.0);
        assert!(transport.poll_event().is_none());
        clock.advance(1.5);
        assert!(matches!(transport.poll_event(), Some(TransportEvent::Finished)));
        assert_eq!(transport.phase(), PlaybackPhase::Ready);
    }

    #[test]
    fn dispose_releases_output_once() {
        let (mut transport, _, output) = loaded(2.0);
        transport.dispose();
        transport.dispose();
        let releases = output
            .calls()
            .into_iter()
            .filter(|call| *call == OutputCall::Release)
            .count();
        assert_eq!(releases, 1);
        assert!(transport.play(0.0).is_ok());
        assert_eq!(transport.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn drop_releases_output_even_without_playback() {
        let clock = Arc::new(ManualClock::new());
        let output = RecordingOutput::default();
        drop(CustomAudioTransport::new(Box::new(output.clone()), clock));
        assert_eq!(output.calls(), vec![OutputCall::Halt, OutputCall::Release]);
    }

    #[tokio::test]
    async fn load_decodes_source() {
        let clock = Arc::new(ManualClock::new());
        let mut transport = CustomAudioTransport::new(Box::new(RecordingOutput::default()), clock);
        transport
            .load(&AudioSource::Memory(wav_bytes(1.5, 8_000)))
            .await
            .unwrap();
        assert_eq!(transport.phase(), PlaybackPhase::Ready);
        assert!((transport.duration() - 1.5).abs() < 0.01);
    }

    #[tokio::test]
    async fn failed_load_leaves_transport_idle() {
        let (mut transport, _, _) = loaded(3.0);
        let err = transport
            .load(&AudioSource::Memory(vec![7u8; 64].into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));
        assert_eq!(transport.phase(), PlaybackPhase::Idle);
        assert_eq!(transport.duration(), 0.0);
    }

    #[tokio::test]
    async fn load_after_dispose_is_unavailable() {
        let (mut transport, _, _) = loaded(3.0);
        transport.dispose();
        let err = transport
            .load(&AudioSource::Memory(wav_bytes(1.0, 8_000)))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ResourceUnavailable(_)));
    }
}
