//! espeak-ng speech engine: text → WAV (espeak-ng --stdin --stdout) → rodio Sink playback.
//!
//! Each utterance runs on a blocking worker:
//! 1. Render the utterance with espeak-ng using the derived rate/pitch; the
//!    text goes in on stdin so it is never parsed as an option
//! 2. Decode the WAV output
//! 3. Append to the utterance's sink and report `Start`
//! 4. Poll the sink until it drains (`End`) or the utterance is cancelled

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use super::engine::{SpeechEngine, SpeechEvent, SpeechEventKind, Utterance};
use crate::audio::decode_bytes;
use crate::config::SynthesisConfig;
use crate::error::{Result, SyncError};
use crate::settings::VoiceType;

const DRAIN_POLL: Duration = Duration::from_millis(50);

type SharedSink = Arc<Mutex<Option<Sink>>>;

pub struct EspeakEngine {
    config: SynthesisConfig,

    // Audio output (kept alive for the engine's lifetime)
    output_stream: OutputStream,

    // Sink and cancel flag of the utterance currently owned by the engine
    active_sink: SharedSink,
    cancel_flag: Arc<AtomicBool>,
}

impl EspeakEngine {
    pub fn new(config: &SynthesisConfig) -> Result<Self> {
        let output_stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| SyncError::ResourceUnavailable(format!("failed to open audio output: {e}")))?;
        info!("espeak engine ready (binary: {}, voice: {})", config.binary, config.language);

        Ok(Self {
            config: config.clone(),
            output_stream,
            active_sink: Arc::new(Mutex::new(None)),
            cancel_flag: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl SpeechEngine for EspeakEngine {
    fn speak(
        &mut self,
        id: u64,
        utterance: &Utterance,
        events: UnboundedSender<SpeechEvent>,
    ) -> Result<()> {
        self.cancel();

        let cancel = Arc::new(AtomicBool::new(false));
        let sink: SharedSink = Arc::new(Mutex::new(Some(Sink::connect_new(
            self.output_stream.mixer(),
        ))));
        self.cancel_flag = cancel.clone();
        self.active_sink = sink.clone();

        let job = EspeakJob {
            id,
            binary: self.config.binary.clone(),
            args: command_args(&self.config, utterance),
            text: utterance.text.clone(),
            volume: utterance.volume,
            cancel,
            sink,
            events,
        };
        debug!("Utterance #{id}: {} chars", utterance.text.chars().count());
        tokio::task::spawn_blocking(move || job.run());
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(sink) = self.active_sink.lock().unwrap().as_ref() {
            sink.pause();
        }
    }

    fn resume(&mut self) {
        if let Some(sink) = self.active_sink.lock().unwrap().as_ref() {
            sink.play();
        }
    }

    fn cancel(&mut self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
        if let Some(sink) = self.active_sink.lock().unwrap().take() {
            sink.stop();
        }
    }
}

impl Drop for EspeakEngine {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// espeak-ng voice variant for a voice type.
fn variant(voice_type: VoiceType) -> &'static str {
    match voice_type {
        VoiceType::Male => "m3",
        VoiceType::Child => "f5",
        VoiceType::Female | VoiceType::Custom => "f3",
    }
}

/// Command-line arguments rendering `utterance` as WAV on stdout.
///
/// The text itself is not among them; it is fed through stdin.
fn command_args(config: &SynthesisConfig, utterance: &Utterance) -> Vec<String> {
    let words_per_minute = (config.words_per_minute as f32 * utterance.rate)
        .round()
        .clamp(80.0, 450.0) as u32;
    let pitch = (config.pitch as f32 * utterance.pitch).round().clamp(0.0, 99.0) as u32;
    let amplitude = (100.0 * utterance.volume).round().clamp(0.0, 200.0) as u32;

    vec![
        "-v".into(),
        format!("{}+{}", config.language, variant(utterance.voice_type)),
        "-s".into(),
        words_per_minute.to_string(),
        "-p".into(),
        pitch.to_string(),
        "-a".into(),
        amplitude.to_string(),
        "--stdout".into(),
        "--stdin".into(),
    ]
}

/// Run `binary` with `args`, writing `text` to its stdin, and collect stdout.
fn render(binary: &str, args: &[String], text: &str) -> std::result::Result<Vec<u8>, String> {
    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to run {binary}: {e}"))?;

    // Written from its own thread: the child may fill stdout before it has read all of stdin
    let writer = child.stdin.take().map(|mut stdin| {
        let text = text.to_string();
        std::thread::spawn(move || stdin.write_all(text.as_bytes()))
    });

    let out = child
        .wait_with_output()
        .map_err(|e| format!("failed to wait for {binary}: {e}"))?;
    let written = writer.map(|writer| writer.join());

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(format!("{binary} exited with {}: {}", out.status, stderr.trim()));
    }
    match written {
        Some(Ok(Err(e))) => return Err(format!("failed to send text to {binary}: {e}")),
        Some(Err(_)) => return Err(format!("stdin writer for {binary} panicked")),
        _ => {}
    }
    Ok(out.stdout)
}

struct EspeakJob {
    id: u64,
    binary: String,
    args: Vec<String>,
    text: String,
    volume: f32,
    cancel: Arc<AtomicBool>,
    sink: SharedSink,
    events: UnboundedSender<SpeechEvent>,
}

impl EspeakJob {
    fn send(&self, kind: SpeechEventKind) {
        // Receiver gone means the transport was dropped; nothing left to notify
        let _ = self.events.send(SpeechEvent {
            utterance: self.id,
            kind,
        });
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn run(self) {
        let t_gen = Instant::now();
        let wav = match render(&self.binary, &self.args, &self.text) {
            Ok(wav) => wav,
            Err(e) => {
                self.send(SpeechEventKind::Error(e));
                return;
            }
        };

        if self.cancelled() {
            debug!("Utterance #{} cancelled during generation", self.id);
            return;
        }

        let audio = match decode_bytes(wav.into()) {
            Ok(audio) => audio,
            Err(e) => {
                self.send(SpeechEventKind::Error(e.to_string()));
                return;
            }
        };
        debug!(
            "Utterance #{}: gen={}ms, {:.1}s of audio",
            self.id,
            t_gen.elapsed().as_millis(),
            audio.duration()
        );

        {
            let guard = self.sink.lock().unwrap();
            let Some(sink) = guard.as_ref() else {
                return;
            };
            sink.set_volume(self.volume);
            sink.append(SamplesBuffer::new(
                audio.channels(),
                audio.sample_rate(),
                audio.samples_from(0.0).to_vec(),
            ));
        }
        self.send(SpeechEventKind::Start);

        loop {
            if self.cancelled() {
                if let Some(sink) = self.sink.lock().unwrap().take() {
                    sink.stop();
                }
                debug!("Utterance #{} cancelled during playback", self.id);
                return;
            }

            let drained = match self.sink.lock().unwrap().as_ref() {
                Some(sink) => sink.empty(),
                None => true,
            };
            if drained {
                self.send(SpeechEventKind::End);
                return;
            }

            std::thread::sleep(DRAIN_POLL);
        }
    }
}
