//! Configuration management for read-aloud.
//!
//! Loads config from YAML files in standard locations. Every section and
//! field is optional; missing values take the defaults below.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Result, SyncError};
use crate::settings::VoiceSettings;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// How often the playback position is sampled and republished.
    pub poll_interval_ms: u64,
    /// How often the session drives the coordinator (engine events, timers).
    pub tick_interval_ms: u64,
    /// Reading speed assumed when estimating synthesis duration.
    pub chars_per_second: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            tick_interval_ms: 20,
            chars_per_second: 100.0,
        }
    }
}

impl PlaybackConfig {
    pub fn poll_interval_secs(&self) -> f64 {
        self.poll_interval_ms as f64 / 1000.0
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub binary: String,
    /// espeak-ng voice (language) name.
    pub language: String,
    /// Words per minute at normal speed.
    pub words_per_minute: u32,
    /// espeak-ng pitch (0-99) at a 1.0 pitch multiplier.
    pub pitch: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            binary: "espeak-ng".into(),
            language: "cmn".into(),
            words_per_minute: 175,
            pitch: 50,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Settings and voice library directory. Defaults to ~/.read-aloud.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub voice: VoiceSettings,
    pub playback: PlaybackConfig,
    pub synthesis: SynthesisConfig,
    pub store: StoreConfig,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist and parse; its errors are returned.
    /// Without one, the first existing file among [`Config::search_paths`]
    /// is used, and a broken file there only costs a warning.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            let config = Self::from_file(path)?;
            info!("Loaded config from {}", path.display());
            return Ok(config);
        }

        let Some(found) = Self::search_paths().into_iter().find(|p| p.exists()) else {
            info!("No config file found, using defaults");
            return Ok(Self::default());
        };
        match Self::from_file(&found) {
            Ok(config) => {
                info!("Loaded config from {}", found.display());
                Ok(config)
            }
            Err(e) => {
                warn!("{e}, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// ./config.yaml, ~/.config/read-aloud/config.yaml, /etc/read-aloud/config.yaml
    pub fn search_paths() -> Vec<PathBuf> {
        [
            std::env::current_dir().ok().map(|d| d.join("config.yaml")),
            dirs::home_dir().map(|h| h.join(".config/read-aloud/config.yaml")),
            Some(PathBuf::from("/etc/read-aloud/config.yaml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&contents)
            .map_err(|e| SyncError::Config(format!("invalid config {}: {e}", path.display())))
    }

    pub fn parse(contents: &str) -> std::result::Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }
}
