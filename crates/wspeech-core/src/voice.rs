//! Voice tags and best-effort voice selection.

use crate::error::{SpeechError, SpeechResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Requested voice identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceTag {
    /// Female voice
    #[default]
    Female,
    /// Male voice
    Male,
}

impl VoiceTag {
    /// espeak-ng voice variant for this tag
    #[must_use]
    pub const fn espeak_variant(self) -> &'static str {
        match self {
            Self::Female => "en-us+f3",
            Self::Male => "en-us+m3",
        }
    }
}

impl std::fmt::Display for VoiceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Female => write!(f, "female"),
            Self::Male => write!(f, "male"),
        }
    }
}

impl FromStr for VoiceTag {
    type Err = SpeechError;

    /// Accepts `female`/`male` as well as display labels such as "Zira (Female EN)"
    fn from_str(s: &str) -> SpeechResult<Self> {
        let lower = s.to_lowercase();
        if lower.contains("female") || lower.contains("zira") {
            Ok(Self::Female)
        } else if lower.contains("male") || lower.contains("david") {
            Ok(Self::Male)
        } else {
            Err(SpeechError::voice_not_found(s))
        }
    }
}

/// A voice offered by an in-process engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVoice {
    /// Engine-specific identifier passed back when selecting the voice
    pub id: String,
    /// Human-readable name
    pub name: String,
}

impl EngineVoice {
    /// Create a voice entry
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Substring hints used to guess a voice's identity from its name and id.
///
/// Voice naming differs per engine and platform, so matching is best-effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceHints {
    /// Hints for female voices
    pub female: Vec<String>,
    /// Hints for male voices
    pub male: Vec<String>,
}

impl Default for VoiceHints {
    fn default() -> Self {
        Self {
            female: ["female", "zira", "f3", "f4"].map(String::from).to_vec(),
            male: ["male", "david", "m3"].map(String::from).to_vec(),
        }
    }
}

impl VoiceHints {
    fn hints(&self, tag: VoiceTag) -> &[String] {
        match tag {
            VoiceTag::Female => &self.female,
            VoiceTag::Male => &self.male,
        }
    }

    /// Whether `voice` looks like it matches `tag`
    #[must_use]
    pub fn matches(&self, voice: &EngineVoice, tag: VoiceTag) -> bool {
        let name = voice.name.to_lowercase();
        let id = voice.id.to_lowercase();
        // "female" contains "male"; never pick a female voice for a male request.
        if tag == VoiceTag::Male && (name.contains("female") || id.contains("female")) {
            return false;
        }
        self.hints(tag).iter().any(|hint| {
            let hint = hint.to_lowercase();
            name.contains(&hint) || id.contains(&hint)
        })
    }

    /// First voice matching `tag`
    #[must_use]
    pub fn select<'a>(&self, voices: &'a [EngineVoice], tag: VoiceTag) -> Option<&'a EngineVoice> {
        voices.iter().find(|voice| self.matches(voice, tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voices() -> Vec<EngineVoice> {
        vec![
            EngineVoice::new("english", "English"),
            EngineVoice::new("english+m3", "English Male 3"),
            EngineVoice::new("HKEY\\TTS_MS_EN-US_ZIRA_11.0", "Microsoft Zira Desktop"),
            EngineVoice::new("HKEY\\TTS_MS_EN-US_DAVID_11.0", "Microsoft David Desktop"),
        ]
    }

    #[test]
    fn test_voice_tag_display() {
        assert_eq!(VoiceTag::Female.to_string(), "female");
        assert_eq!(VoiceTag::Male.to_string(), "male");
    }

    #[test]
    fn test_voice_tag_parse() {
        assert_eq!("female".parse::<VoiceTag>().unwrap(), VoiceTag::Female);
        assert_eq!("Zira (Female EN)".parse::<VoiceTag>().unwrap(), VoiceTag::Female);
        assert_eq!("David (Male EN)".parse::<VoiceTag>().unwrap(), VoiceTag::Male);
        assert_eq!("MALE".parse::<VoiceTag>().unwrap(), VoiceTag::Male);
        assert!("robot".parse::<VoiceTag>().is_err());
    }

    #[test]
    fn test_espeak_variant() {
        assert_eq!(VoiceTag::Female.espeak_variant(), "en-us+f3");
        assert_eq!(VoiceTag::Male.espeak_variant(), "en-us+m3");
    }

    #[test]
    fn test_select_female() {
        let hints = VoiceHints::default();
        let voices = voices();
        let voice = hints.select(&voices, VoiceTag::Female).expect("Should find female voice");
        assert_eq!(voice.name, "Microsoft Zira Desktop");
    }

    #[test]
    fn test_select_male() {
        let hints = VoiceHints::default();
        let voices = voices();
        let voice = hints.select(&voices, VoiceTag::Male).expect("Should find male voice");
        assert_eq!(voice.id, "english+m3");
    }

    #[test]
    fn test_male_request_skips_female_names() {
        let hints = VoiceHints::default();
        let voices = vec![
            EngineVoice::new("v1", "Female One"),
            EngineVoice::new("v2", "Male Two"),
        ];
        assert_eq!(hints.select(&voices, VoiceTag::Male).unwrap().id, "v2");
    }

    #[test]
    fn test_no_match() {
        let hints = VoiceHints::default();
        let voices = vec![EngineVoice::new("english", "English")];
        assert!(hints.select(&voices, VoiceTag::Female).is_none());
    }

    #[test]
    fn test_custom_hints() {
        let hints = VoiceHints {
            female: vec!["samantha".to_string()],
            male: vec!["alex".to_string()],
        };
        let voices = vec![
            EngineVoice::new("com.apple.voice.Alex", "Alex"),
            EngineVoice::new("com.apple.voice.Samantha", "Samantha"),
        ];
        assert_eq!(hints.select(&voices, VoiceTag::Female).unwrap().name, "Samantha");
        assert_eq!(hints.select(&voices, VoiceTag::Male).unwrap().name, "Alex");
    }

    #[test]
    fn test_voice_tag_serialization() {
        let tag: VoiceTag = toml::from_str::<toml::Value>("v = \"male\"")
            .unwrap()
            .get("v")
            .cloned()
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(tag, VoiceTag::Male);
    }
}
