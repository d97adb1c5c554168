//! Test doubles shared by the unit test modules.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;

use crate::audio::{AudioOutput, DecodedAudio, OutputFactory};
use crate::error::{Result, SyncError};
use crate::synthesis::{SpeechEngine, SpeechEvent, SpeechEventKind, Utterance};

/// A mono 16-bit WAV file of `seconds` of a quiet tone.
pub fn wav_bytes(seconds: f64, rate: u32) -> Arc<[u8]> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let frames = (seconds * rate as f64) as usize;
        for i in 0..frames {
            let phase = i as f32 * 440.0 * std::f32::consts::TAU / rate as f32;
            writer.write_sample((phase.sin() * 3000.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner().into()
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputCall {
    Start(f64),
    Halt,
    Release,
}

/// Output that records what the transport asked of it.
#[derive(Debug, Clone, Default)]
pub struct RecordingOutput {
    calls: Arc<Mutex<Vec<OutputCall>>>,
}

impl RecordingOutput {
    pub fn calls(&self) -> Vec<OutputCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Factory handing out clones that share this recorder.
    pub fn factory(&self) -> OutputFactory {
        let output = self.clone();
        Box::new(move || Ok(Box::new(output.clone()) as Box<dyn AudioOutput>))
    }
}

impl AudioOutput for RecordingOutput {
    fn start(&mut self, _audio: &DecodedAudio, offset: f64) {
        self.calls.lock().unwrap().push(OutputCall::Start(offset));
    }

    fn halt(&mut self) {
        self.calls.lock().unwrap().push(OutputCall::Halt);
    }

    fn release(&mut self) {
        self.calls.lock().unwrap().push(OutputCall::Release);
    }
}

/// Factory that fails the way a missing audio device does.
pub fn unavailable_outputs() -> OutputFactory {
    Box::new(|| Err(SyncError::ResourceUnavailable("no output device".into())))
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Speak(u64, Utterance),
    Pause,
    Resume,
    Cancel,
}

#[derive(Default)]
struct EngineState {
    calls: Vec<EngineCall>,
    last_id: u64,
    events: Option<UnboundedSender<SpeechEvent>>,
    fail_next: bool,
}

/// Speech engine driven by the test: events are emitted by hand.
#[derive(Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<EngineState>>,
}

impl FakeEngine {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Id of the most recently submitted utterance, 0 if none.
    pub fn last_id(&self) -> u64 {
        self.state.lock().unwrap().last_id
    }

    /// Most recently submitted utterance.
    pub fn last_utterance(&self) -> Option<Utterance> {
        self.calls().into_iter().rev().find_map(|call| match call {
            EngineCall::Speak(_, utterance) => Some(utterance),
            _ => None,
        })
    }

    pub fn fail_next_speak(&self) {
        self.state.lock().unwrap().fail_next = true;
    }

    /// Emit an event for the latest utterance.
    pub fn emit(&self, kind: SpeechEventKind) {
        let id = self.last_id();
        self.emit_for(id, kind);
    }

    pub fn emit_for(&self, utterance: u64, kind: SpeechEventKind) {
        let state = self.state.lock().unwrap();
        let events = state.events.as_ref().expect("no utterance was submitted");
        events.send(SpeechEvent { utterance, kind }).unwrap();
    }
}

impl SpeechEngine for FakeEngine {
    fn speak(
        &mut self,
        id: u64,
        utterance: &Utterance,
        events: UnboundedSender<SpeechEvent>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next) {
            return Err(SyncError::Synthesis("engine refused utterance".into()));
        }
        state.calls.push(EngineCall::Speak(id, utterance.clone()));
        state.last_id = id;
        state.events = Some(events);
        Ok(())
    }

    fn pause(&mut self) {
        self.state.lock().unwrap().calls.push(EngineCall::Pause);
    }

    fn resume(&mut self) {
        self.state.lock().unwrap().calls.push(EngineCall::Resume);
    }

    fn cancel(&mut self) {
        self.state.lock().unwrap().calls.push(EngineCall::Cancel);
    }
}
