//! Audio output backends for the custom voice transport.

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use tracing::{debug, info, warn};

use super::source::DecodedAudio;
use crate::error::{Result, SyncError};

/// A device that plays one run of a decoded buffer at a time.
pub trait AudioOutput {
    /// Begin playing `audio` from `offset` seconds, replacing any current run.
    fn start(&mut self, audio: &DecodedAudio, offset: f64);

    /// Tear down the current run, if any.
    fn halt(&mut self);

    /// Give the device back. The output is unusable afterwards.
    fn release(&mut self);
}

/// Creates outputs on demand; one per custom transport.
pub type OutputFactory = Box<dyn FnMut() -> Result<Box<dyn AudioOutput>>>;

/// Factory that opens the default output device through rodio.
pub fn default_output_factory() -> OutputFactory {
    Box::new(|| Ok(Box::new(RodioOutput::open()?) as Box<dyn AudioOutput>))
}

/// rodio-backed output: the stream is held for the transport's lifetime,
/// each run gets a fresh sink.
pub struct RodioOutput {
    // In rodio 0.21 the OutputStream is the device handle; dropping it closes the device
    stream: Option<OutputStream>,
    sink: Option<Sink>,
}

impl RodioOutput {
    pub fn open() -> Result<Self> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| SyncError::ResourceUnavailable(format!("failed to open audio output: {e}")))?;
        info!("Audio output opened");
        Ok(Self {
            stream: Some(stream),
            sink: None,
        })
    }
}

impl AudioOutput for RodioOutput {
    fn start(&mut self, audio: &DecodedAudio, offset: f64) {
        self.halt();

        let Some(stream) = &self.stream else {
            warn!("Audio output already released");
            return;
        };

        let sink = Sink::connect_new(stream.mixer());
        let samples = audio.samples_from(offset).to_vec();
        debug!("Starting run at {offset:.2}s ({} samples)", samples.len());
        sink.append(SamplesBuffer::new(audio.channels(), audio.sample_rate(), samples));
        self.sink = Some(sink);
    }

    fn halt(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn release(&mut self) {
        self.halt();
        if self.stream.take().is_some() {
            info!("Audio output released");
        }
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        self.release();
    }
}
