//! Settings snapshot and custom voice library.
//!
//! Stored as JSON under ~/.read-aloud/ (or the configured directory):
//! - settings.json: the last `VoiceSettings`
//! - voices.json: registered custom voice recordings

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audio::{self, AudioSource};
use crate::config::StoreConfig;
use crate::error::{Result, SyncError};
use crate::settings::VoiceSettings;

const SETTINGS_FILE: &str = "settings.json";
const VOICES_FILE: &str = "voices.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomVoice {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub uploaded_at: String,
    /// Length in seconds.
    pub duration: f64,
    /// Size in bytes.
    pub file_size: u64,
}

impl CustomVoice {
    pub fn source(&self) -> AudioSource {
        AudioSource::File(self.path.clone())
    }
}

pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store at the configured directory, or ~/.read-aloud.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let dir = config
            .dir
            .clone()
            .or_else(|| dirs::home_dir().map(|h| h.join(".read-aloud")))
            .ok_or_else(|| SyncError::Config("no store directory and no home directory".into()))?;
        Ok(Self::new(dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_settings(&self, settings: &VoiceSettings) -> Result<()> {
        self.write_json(SETTINGS_FILE, &settings.persistable())
    }

    /// Saved settings; `None` when nothing was saved or the file is unreadable.
    pub fn load_settings(&self) -> Option<VoiceSettings> {
        let path = self.dir.join(SETTINGS_FILE);
        let contents = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!("Failed to parse {}: {e}, ignoring saved settings", path.display());
                None
            }
        }
    }

    pub fn load_custom_voices(&self) -> Vec<CustomVoice> {
        let path = self.dir.join(VOICES_FILE);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&contents) {
            Ok(voices) => voices,
            Err(e) => {
                warn!("Failed to parse {}: {e}", path.display());
                Vec::new()
            }
        }
    }

    pub fn save_custom_voice(&self, voice: &CustomVoice) -> Result<()> {
        let mut voices = self.load_custom_voices();
        voices.retain(|v| v.id != voice.id);
        voices.push(voice.clone());
        self.write_json(VOICES_FILE, &voices)
    }

    /// Remove a voice from the library. Returns whether it was present.
    pub fn delete_custom_voice(&self, id: &str) -> Result<bool> {
        let mut voices = self.load_custom_voices();
        let before = voices.len();
        voices.retain(|v| v.id != id);
        if voices.len() == before {
            return Ok(false);
        }
        self.write_json(VOICES_FILE, &voices)?;
        info!("Deleted custom voice {id}");
        Ok(true)
    }

    pub fn find_custom_voice(&self, id_or_name: &str) -> Option<CustomVoice> {
        self.load_custom_voices()
            .into_iter()
            .find(|v| v.id == id_or_name || v.name == id_or_name)
    }

    /// Decode `path` to validate it, then add it to the library.
    pub async fn register_custom_voice(&self, path: &Path, name: Option<&str>) -> Result<CustomVoice> {
        let path = path.canonicalize()?;
        let file_size = tokio::fs::metadata(&path).await?.len();
        let audio = audio::load(&AudioSource::File(path.clone())).await?;

        let now = Local::now();
        let name = name.map(str::to_string).unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "custom voice".into())
        });
        let voice = CustomVoice {
            id: format!("voice-{}", now.timestamp_millis()),
            name,
            path,
            uploaded_at: now.to_rfc3339(),
            duration: audio.duration(),
            file_size,
        };
        self.save_custom_voice(&voice)?;
        info!("Registered custom voice {} ({:.1}s)", voice.name, voice.duration);
        Ok(voice)
    }

    fn write_json<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(value)?;
        fs::write(self.dir.join(file), json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Tone, VoiceType};
    use crate::testing::wav_bytes;

    fn voice(id: &str, name: &str) -> CustomVoice {
        CustomVoice {
            id: id.into(),
            name: name.into(),
            path: PathBuf::from(format!("/voices/{name}.wav")),
            uploaded_at: "2024-05-01T08:00:00+08:00".into(),
            duration: 12.5,
            file_size: 200_000,
        }
    }

    #[test]
    fn settings_roundtrip_drops_memory_sources() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let settings = VoiceSettings {
            voice_type: VoiceType::Custom,
            tone: Tone::Lively,
            custom_voice_source: Some(AudioSource::Memory(vec![1, 2, 3].into())),
            ..VoiceSettings::default()
        };
        store.save_settings(&settings).unwrap();

        let loaded = store.load_settings().unwrap();
        assert_eq!(loaded.voice_type, VoiceType::Custom);
        assert_eq!(loaded.tone, Tone::Lively);
        assert!(loaded.custom_voice_source.is_none());
    }

    #[test]
    fn file_sources_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let settings = VoiceSettings {
            voice_type: VoiceType::Custom,
            custom_voice_source: Some(AudioSource::File("/voices/me.mp3".into())),
            ..VoiceSettings::default()
        };
        store.save_settings(&settings).unwrap();
        assert_eq!(store.load_settings(), Some(settings));
    }

    #[test]
    fn missing_or_corrupt_settings_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        assert!(store.load_settings().is_none());

        fs::write(dir.path().join(SETTINGS_FILE), "{ not json").unwrap();
        assert!(store.load_settings().is_none());

        fs::write(dir.path().join(SETTINGS_FILE), r#"{"speed": "fast"}"#).unwrap();
        let partial = store.load_settings().unwrap();
        assert_eq!(partial.speed, crate::settings::Speed::Fast);
        assert_eq!(partial.voice_type, VoiceType::Female);
    }

    #[test]
    fn voice_library_save_find_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("nested"));
        store.save_custom_voice(&voice("a", "tutor")).unwrap();
        store.save_custom_voice(&voice("b", "parent")).unwrap();
        store.save_custom_voice(&voice("a", "tutor-v2")).unwrap();

        let voices = store.load_custom_voices();
        assert_eq!(voices.len(), 2);
        assert_eq!(store.find_custom_voice("tutor-v2").unwrap().id, "a");
        assert_eq!(store.find_custom_voice("b").unwrap().name, "parent");

        assert!(store.delete_custom_voice("a").unwrap());
        assert!(!store.delete_custom_voice("a").unwrap());
        assert_eq!(store.load_custom_voices(), vec![voice("b", "parent")]);
    }

    #[tokio::test]
    async fn registering_measures_the_recording() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("grandma.wav");
        fs::write(&wav, &*wav_bytes(2.0, 8_000)).unwrap();

        let store = Store::new(dir.path().join("store"));
        let voice = store.register_custom_voice(&wav, None).await.unwrap();
        assert_eq!(voice.name, "grandma");
        assert!((voice.duration - 2.0).abs() < 0.01);
        assert_eq!(voice.file_size, fs::metadata(&wav).unwrap().len());
        assert_eq!(store.load_custom_voices(), vec![voice]);
    }

    #[tokio::test]
    async fn registering_garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let junk = dir.path().join("junk.wav");
        fs::write(&junk, [0u8; 64]).unwrap();
        let store = Store::new(dir.path().join("store"));
        let err = store.register_custom_voice(&junk, Some("junk")).await.unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));
        assert!(store.load_custom_voices().is_empty());
    }
}
