//! Voice settings and the derived playback parameters.
//!
//! Settings are plain data owned by the host. Everything here is a pure
//! derivation: rate and pitch multipliers, subject voice profiles, and the
//! custom-voice failover applied before playback.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::audio::AudioSource;
use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceType {
    Male,
    #[default]
    Female,
    Child,
    Custom,
}

impl VoiceType {
    /// Base pitch multiplier for the voice type.
    pub fn base_pitch(self) -> f32 {
        match self {
            Self::Male => 0.85,
            Self::Female => 1.0,
            Self::Child => 1.3,
            Self::Custom => 1.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Male => "男声",
            Self::Female => "女声",
            Self::Child => "童声",
            Self::Custom => "自定义",
        }
    }

    /// Platform voice names to try, most preferred first.
    ///
    /// Entries are matched against either the voice name or its language
    /// tag, so the trailing `zh-CN` catches any Mandarin voice.
    pub fn preferred_voices(self) -> &'static [&'static str] {
        match self {
            Self::Male => &[
                "Microsoft Yunyang Online (Natural) - Chinese (Mainland)",
                "Microsoft Yunjian Online (Natural) - Chinese (Mainland)",
                "zh-CN-YunyangNeural",
                "zh-CN",
            ],
            Self::Female => &[
                "Microsoft Xiaoxiao Online (Natural) - Chinese (Mainland)",
                "Microsoft Xiaoyi Online (Natural) - Chinese (Mainland)",
                "zh-CN-XiaoxiaoNeural",
                "zh-CN",
            ],
            Self::Child => &[
                "Microsoft Yunxi Online (Natural) - Chinese (Mainland)",
                "Microsoft Xiaomo Online (Natural) - Chinese (Mainland)",
                "zh-CN-YunxiNeural",
                "zh-CN",
            ],
            Self::Custom => &[],
        }
    }
}

impl FromStr for VoiceType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "child" => Ok(Self::Child),
            "custom" => Ok(Self::Custom),
            other => Err(SyncError::Config(format!("unknown voice type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl Speed {
    pub fn rate(self) -> f32 {
        match self {
            Self::Slow => 0.7,
            Self::Normal => 1.0,
            Self::Fast => 1.3,
        }
    }
}

impl FromStr for Speed {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "slow" => Ok(Self::Slow),
            "normal" => Ok(Self::Normal),
            "fast" => Ok(Self::Fast),
            other => Err(SyncError::Config(format!("unknown speed: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Calm,
    Lively,
    Composed,
}

impl Tone {
    pub fn pitch(self) -> f32 {
        match self {
            Self::Calm => 0.9,
            Self::Lively => 1.2,
            Self::Composed => 1.0,
        }
    }
}

impl FromStr for Tone {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "calm" => Ok(Self::Calm),
            "lively" => Ok(Self::Lively),
            "composed" => Ok(Self::Composed),
            other => Err(SyncError::Config(format!("unknown tone: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub voice_type: VoiceType,
    pub speed: Speed,
    pub tone: Tone,
    pub custom_voice_source: Option<AudioSource>,
    pub custom_voice_name: Option<String>,
    pub enabled: bool,
    /// Segment the text and publish the segment being spoken.
    pub sync_with_text: bool,
    /// Let subject changes overwrite voice type, tone and speed.
    pub auto_adjust_by_subject: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice_type: VoiceType::Female,
            speed: Speed::Normal,
            tone: Tone::Calm,
            custom_voice_source: None,
            custom_voice_name: None,
            enabled: true,
            sync_with_text: true,
            auto_adjust_by_subject: true,
        }
    }
}

impl VoiceSettings {
    /// The custom source, if one is set and non-empty.
    pub fn custom_source(&self) -> Option<&AudioSource> {
        self.custom_voice_source.as_ref().filter(|s| !s.is_empty())
    }

    /// True when playback should go through the custom audio transport.
    pub fn wants_custom_audio(&self) -> bool {
        self.voice_type == VoiceType::Custom && self.custom_source().is_some()
    }

    /// Settings as they apply to playback: a custom voice without a usable
    /// source falls back to the female synthesis profile.
    pub fn resolved_for_playback(&self) -> VoiceSettings {
        let mut resolved = self.clone();
        if resolved.voice_type == VoiceType::Custom && resolved.custom_source().is_none() {
            resolved.voice_type = VoiceType::Female;
        }
        resolved
    }

    pub fn apply(&self, patch: &SettingsPatch) -> VoiceSettings {
        let mut next = self.clone();
        if let Some(voice_type) = patch.voice_type {
            next.voice_type = voice_type;
        }
        if let Some(tone) = patch.tone {
            next.tone = tone;
        }
        if let Some(speed) = patch.speed {
            next.speed = speed;
        }
        next
    }

    /// Settings after switching to `subject`, honoring `auto_adjust_by_subject`.
    pub fn apply_subject(&self, subject: &str) -> VoiceSettings {
        self.apply(&resolve_voice_profile(subject, self))
    }

    /// A copy that can be written to disk: in-memory sources are dropped.
    pub fn persistable(&self) -> VoiceSettings {
        let mut copy = self.clone();
        if matches!(copy.custom_voice_source, Some(AudioSource::Memory(_))) {
            copy.custom_voice_source = None;
        }
        copy
    }
}

pub fn effective_rate(settings: &VoiceSettings) -> f32 {
    settings.speed.rate()
}

pub fn effective_pitch(settings: &VoiceSettings) -> f32 {
    settings.tone.pitch() * settings.voice_type.base_pitch()
}

/// Partial settings produced by a subject profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub voice_type: Option<VoiceType>,
    pub tone: Option<Tone>,
    pub speed: Option<Speed>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.voice_type.is_none() && self.tone.is_none() && self.speed.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    Chinese,
    Math,
    MathCompetition,
    English,
    Science,
    Arts,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceProfile {
    pub voice_type: VoiceType,
    pub tone: Tone,
    pub speed: Speed,
    pub description: &'static str,
}

impl Subject {
    pub const ALL: [Subject; 7] = [
        Subject::Chinese,
        Subject::Math,
        Subject::MathCompetition,
        Subject::English,
        Subject::Science,
        Subject::Arts,
        Subject::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chinese => "chinese",
            Self::Math => "math",
            Self::MathCompetition => "math-competition",
            Self::English => "english",
            Self::Science => "science",
            Self::Arts => "arts",
            Self::General => "general",
        }
    }

    pub fn profile(self) -> VoiceProfile {
        use Speed::*;
        use Tone::*;
        use VoiceType::*;

        let (voice_type, tone, speed, description) = match self {
            Self::Chinese => (Female, Calm, Normal, "calm female voice for literature"),
            Self::Math => (Female, Composed, Normal, "composed female voice for step-by-step logic"),
            Self::MathCompetition => (Child, Lively, Fast, "lively child voice for competition drills"),
            Self::English => (Female, Lively, Normal, "lively female voice for language practice"),
            Self::Science => (Male, Composed, Normal, "composed male voice for explanations"),
            Self::Arts => (Female, Lively, Normal, "lively female voice for arts topics"),
            Self::General => (Female, Calm, Normal, "calm female voice"),
        };
        VoiceProfile {
            voice_type,
            tone,
            speed,
            description,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subject {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Subject::ALL
            .into_iter()
            .find(|subject| subject.as_str() == s)
            .ok_or_else(|| SyncError::Config(format!("unknown subject: {s}")))
    }
}

/// Voice fields a subject imposes on `current`.
///
/// Empty when the subject is unknown or subject auto-adjust is off.
pub fn resolve_voice_profile(subject: &str, current: &VoiceSettings) -> SettingsPatch {
    if !current.auto_adjust_by_subject {
        return SettingsPatch::default();
    }
    let Ok(subject) = subject.parse::<Subject>() else {
        return SettingsPatch::default();
    };
    let profile = subject.profile();
    SettingsPatch {
        voice_type: Some(profile.voice_type),
        tone: Some(profile.tone),
        speed: Some(profile.speed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn rate_follows_speed() {
        let mut settings = VoiceSettings::default();
        assert!(approx(effective_rate(&settings), 1.0));
        settings.speed = Speed::Slow;
        assert!(approx(effective_rate(&settings), 0.7));
        settings.speed = Speed::Fast;
        assert!(approx(effective_rate(&settings), 1.3));
    }

    #[test]
    fn pitch_combines_tone_and_voice_type() {
        let settings = VoiceSettings {
            voice_type: VoiceType::Male,
            tone: Tone::Lively,
            ..VoiceSettings::default()
        };
        assert!(approx(effective_pitch(&settings), 1.2 * 0.85));

        let settings = VoiceSettings {
            voice_type: VoiceType::Child,
            tone: Tone::Calm,
            ..VoiceSettings::default()
        };
        assert!(approx(effective_pitch(&settings), 0.9 * 1.3));
    }

    #[test]
    fn custom_without_source_resolves_to_female() {
        let settings = VoiceSettings {
            voice_type: VoiceType::Custom,
            ..VoiceSettings::default()
        };
        assert!(!settings.wants_custom_audio());
        assert_eq!(settings.resolved_for_playback().voice_type, VoiceType::Female);

        let empty = VoiceSettings {
            voice_type: VoiceType::Custom,
            custom_voice_source: Some(AudioSource::File(PathBuf::new())),
            ..VoiceSettings::default()
        };
        assert!(!empty.wants_custom_audio());
        assert_eq!(empty.resolved_for_playback().voice_type, VoiceType::Female);
    }

    #[test]
    fn custom_with_source_is_kept() {
        let settings = VoiceSettings {
            voice_type: VoiceType::Custom,
            custom_voice_source: Some(AudioSource::File("voice.wav".into())),
            ..VoiceSettings::default()
        };
        assert!(settings.wants_custom_audio());
        assert_eq!(settings.resolved_for_playback().voice_type, VoiceType::Custom);
    }

    #[test]
    fn subject_profile_overwrites_voice_fields() {
        let settings = VoiceSettings::default().apply_subject("math-competition");
        assert_eq!(settings.voice_type, VoiceType::Child);
        assert_eq!(settings.tone, Tone::Lively);
        assert_eq!(settings.speed, Speed::Fast);
        assert!(settings.enabled);
    }

    #[test]
    fn subject_profile_respects_auto_adjust_flag() {
        let settings = VoiceSettings {
            auto_adjust_by_subject: false,
            ..VoiceSettings::default()
        };
        assert!(resolve_voice_profile("science", &settings).is_empty());
        assert_eq!(settings.apply_subject("science"), settings);
    }

    #[test]
    fn unknown_subject_yields_empty_patch() {
        assert!(resolve_voice_profile("astrology", &VoiceSettings::default()).is_empty());
    }

    #[test]
    fn subjects_round_trip_through_names() {
        for subject in Subject::ALL {
            assert_eq!(subject.as_str().parse::<Subject>().ok(), Some(subject));
        }
    }

    #[test]
    fn persistable_drops_memory_sources() {
        let settings = VoiceSettings {
            voice_type: VoiceType::Custom,
            custom_voice_source: Some(AudioSource::Memory(vec![1u8, 2, 3].into())),
            ..VoiceSettings::default()
        };
        assert_eq!(settings.persistable().custom_voice_source, None);
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: VoiceSettings = serde_yml::from_str("speed: fast\ntone: lively\n").unwrap();
        assert_eq!(settings.speed, Speed::Fast);
        assert_eq!(settings.tone, Tone::Lively);
        assert_eq!(settings.voice_type, VoiceType::Female);
        assert!(settings.sync_with_text);
    }
}
