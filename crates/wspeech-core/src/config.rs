//! Speech parameters and pipeline settings.

use crate::backend::BackendChoice;
use crate::error::{SpeechError, SpeechResult};
use crate::voice::{VoiceHints, VoiceTag};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Highest accepted speaking rate in words per minute
pub const MAX_RATE: u32 = 1000;

/// Highest pitch value
pub const MAX_PITCH: u8 = 100;

/// Rate, pitch and voice of a speak session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Speaking rate in words per minute
    pub rate: u32,
    /// Pitch on a 0–100 scale, interpreted by the backend
    pub pitch: u8,
    /// Requested voice identity
    pub voice: VoiceTag,
}

impl SpeechConfig {
    /// Set the speaking rate
    ///
    /// # Errors
    ///
    /// Returns an error if the rate is zero or above [`MAX_RATE`]
    pub fn with_rate(mut self, rate: u32) -> SpeechResult<Self> {
        if rate == 0 || rate > MAX_RATE {
            return Err(SpeechError::invalid_input(format!(
                "Rate must be between 1 and {MAX_RATE} words per minute, got {rate}"
            )));
        }
        self.rate = rate;
        Ok(self)
    }

    /// Set the pitch
    ///
    /// # Errors
    ///
    /// Returns an error if the pitch is above [`MAX_PITCH`]
    pub fn with_pitch(mut self, pitch: u8) -> SpeechResult<Self> {
        if pitch > MAX_PITCH {
            return Err(SpeechError::invalid_input(format!(
                "Pitch must be between 0 and {MAX_PITCH}, got {pitch}"
            )));
        }
        self.pitch = pitch;
        Ok(self)
    }

    /// Set the voice
    #[must_use]
    pub const fn with_voice(mut self, voice: VoiceTag) -> Self {
        self.voice = voice;
        self
    }

    /// Tempo ratio of this rate relative to `baseline_rate`
    #[must_use]
    pub fn speed_ratio(&self, baseline_rate: u32) -> f64 {
        f64::from(self.rate) / f64::from(baseline_rate.max(1))
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if rate or pitch is out of range
    pub fn validate(&self) -> SpeechResult<()> {
        Self::default().with_rate(self.rate)?.with_pitch(self.pitch)?;
        Ok(())
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            rate: crate::BASELINE_RATE,
            pitch: 50,
            voice: VoiceTag::Female,
        }
    }
}

/// Network synthesis service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    /// Endpoint returning MP3 audio for a `q` text parameter
    pub endpoint: String,
    /// Value of the `client` query parameter
    pub client: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://translate.google.com/translate_tts".to_string(),
            client: "tw-ob".to_string(),
            timeout_secs: 15,
        }
    }
}

/// An external program and its arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSettings {
    /// Executable name or path
    pub program: String,
    /// Arguments; some commands substitute `{voice}`, `{rate}`, `{pitch}` and `{text}`
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSettings {
    /// Create command settings
    #[must_use]
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    /// Whether the program can be found
    #[must_use]
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }
}

/// Pipeline settings, loaded from `settings.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backend to use, or `auto` to detect one
    pub backend: BackendChoice,
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Interval at which workers poll for stop/pause and playback completion
    pub poll_interval_ms: u64,
    /// Synthesized clips allowed to wait ahead of playback
    pub prefetch_capacity: usize,
    /// Rate in words per minute that the synthesis service speaks at
    pub baseline_rate: u32,
    /// Tempo ratios within this distance of 1.0 are not processed
    pub tempo_tolerance: f64,
    /// Language passed to the synthesis service
    pub language: String,
    /// Default speech parameters
    pub speech: SpeechConfig,
    /// Synthesis service
    pub synthesis: SynthesisSettings,
    /// Audio player used by the streaming backend
    pub player: CommandSettings,
    /// Tempo filter tool
    pub tempo: CommandSettings,
    /// External speech program
    pub process: CommandSettings,
    /// Voice matching hints for in-process engines
    pub voices: VoiceHints,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendChoice::Auto,
            chunk_size: crate::DEFAULT_CHUNK_SIZE,
            poll_interval_ms: 40,
            prefetch_capacity: crate::DEFAULT_PREFETCH_CAPACITY,
            baseline_rate: crate::BASELINE_RATE,
            tempo_tolerance: crate::TEMPO_TOLERANCE,
            language: "en".to_string(),
            speech: SpeechConfig::default(),
            synthesis: SynthesisSettings::default(),
            player: CommandSettings::new("ffplay", &["-nodisp", "-autoexit", "-loglevel", "quiet"]),
            tempo: CommandSettings::new("ffmpeg", &[]),
            process: CommandSettings::new(
                "espeak-ng",
                &["-v", "{voice}", "-s", "{rate}", "-p", "{pitch}", "{text}"],
            ),
            voices: VoiceHints::default(),
        }
    }
}

impl Settings {
    /// Default location of the settings file
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "wspeech").map(|dirs| dirs.config_dir().join("settings.toml"))
    }

    /// Load settings from `path`, or from [`Settings::default_path`] when `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load(path: Option<&Path>) -> SpeechResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    debug!("No settings file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        info!("Loading settings from {}", path.display());
        let content = std::fs::read_to_string(&path).map_err(|e| {
            SpeechError::configuration(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate settings from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid settings
    pub fn from_toml(content: &str) -> SpeechResult<Self> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Poll interval as a duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate settings
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value
    pub fn validate(&self) -> SpeechResult<()> {
        if self.chunk_size == 0 {
            return Err(SpeechError::configuration("chunk_size must be greater than 0"));
        }
        if !(1..=200).contains(&self.poll_interval_ms) {
            return Err(SpeechError::configuration(format!(
                "poll_interval_ms must be between 1 and 200, got {}",
                self.poll_interval_ms
            )));
        }
        if self.prefetch_capacity == 0 {
            return Err(SpeechError::configuration(
                "prefetch_capacity must be greater than 0",
            ));
        }
        if self.baseline_rate == 0 {
            return Err(SpeechError::configuration("baseline_rate must be greater than 0"));
        }
        if !(0.0..1.0).contains(&self.tempo_tolerance) {
            return Err(SpeechError::configuration(format!(
                "tempo_tolerance must be in [0, 1), got {}",
                self.tempo_tolerance
            )));
        }
        if self.language.trim().is_empty() {
            return Err(SpeechError::configuration("language cannot be empty"));
        }
        for (name, command) in [
            ("player", &self.player),
            ("tempo", &self.tempo),
            ("process", &self.process),
        ] {
            if command.program.trim().is_empty() {
                return Err(SpeechError::configuration(format!(
                    "{name}.program cannot be empty"
                )));
            }
        }
        self.speech
            .validate()
            .map_err(|e| SpeechError::configuration(format!("speech: {e}")))
    }
}
