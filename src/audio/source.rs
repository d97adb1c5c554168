//! Custom voice sources and decoding into an addressable sample buffer.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use rodio::{Decoder, Source};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SyncError};

/// Caller-supplied handle to a custom voice recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioSource {
    File(PathBuf),
    /// Bytes already in memory (e.g. an upload). Never persisted.
    #[serde(skip)]
    Memory(Arc<[u8]>),
}

impl AudioSource {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::File(path) => path.as_os_str().is_empty(),
            Self::Memory(bytes) => bytes.is_empty(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Memory(bytes) => format!("<{} bytes in memory>", bytes.len()),
        }
    }
}

/// Interleaved f32 samples with their layout.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    samples: Arc<[f32]>,
    channels: u16,
    sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            channels: channels.max(1),
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Total length in seconds.
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Samples from `offset` seconds to the end, starting on a frame boundary.
    pub fn samples_from(&self, offset: f64) -> &[f32] {
        let frame = (offset.max(0.0) * self.sample_rate as f64) as usize;
        let start = (frame * self.channels as usize).min(self.samples.len());
        &self.samples[start..]
    }
}

/// Decode an encoded audio file held in memory.
pub fn decode_bytes(bytes: Arc<[u8]>) -> Result<DecodedAudio> {
    let t0 = Instant::now();
    let decoder = Decoder::new(Cursor::new(bytes))
        .map_err(|e| SyncError::Decode(format!("unsupported audio format: {e}")))?;

    let channels = decoder.channels();
    let sample_rate = decoder.sample_rate();
    if channels == 0 || sample_rate == 0 {
        return Err(SyncError::Decode(format!(
            "invalid stream layout ({channels} channels @ {sample_rate}Hz)"
        )));
    }

    let samples: Vec<f32> = decoder.collect();
    if samples.is_empty() {
        return Err(SyncError::Decode("audio source contains no samples".into()));
    }

    let audio = DecodedAudio::new(samples, channels, sample_rate);
    debug!(
        "Decoded {:.2}s ({} ch @ {}Hz) in {}ms",
        audio.duration(),
        channels,
        sample_rate,
        t0.elapsed().as_millis()
    );
    Ok(audio)
}

/// Read and decode a source off the async executor.
pub async fn load(source: &AudioSource) -> Result<DecodedAudio> {
    let bytes: Arc<[u8]> = match source {
        AudioSource::File(path) => tokio::fs::read(path)
            .await
            .map_err(|e| SyncError::Decode(format!("cannot read {}: {e}", path.display())))?
            .into(),
        AudioSource::Memory(bytes) => bytes.clone(),
    };

    info!("Decoding custom voice from {}", source.describe());
    tokio::task::spawn_blocking(move || decode_bytes(bytes))
        .await
        .map_err(|e| SyncError::Decode(format!("decoder task failed: {e}")))?
}
