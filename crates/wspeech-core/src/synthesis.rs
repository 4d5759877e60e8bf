//! Network text-to-speech synthesis.

use crate::artifact::AudioArtifact;
use crate::config::SynthesisSettings;
use crate::error::{SpeechError, SpeechResult};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Service turning text into an audio clip
pub trait SynthesisService: Send + Sync {
    /// Synthesize `text` spoken in `language` to a new clip
    ///
    /// # Errors
    ///
    /// Returns an error if the service is unreachable, rejects the request or
    /// returns no audio
    fn synthesize(&self, text: &str, language: &str) -> SpeechResult<AudioArtifact>;
}

/// Client for the Google Translate TTS endpoint.
///
/// The endpoint answers a GET with MP3 audio at a fixed speaking rate of
/// roughly 160 words per minute.
#[derive(Debug, Clone)]
pub struct TranslateTts {
    client: Client,
    settings: SynthesisSettings,
}

impl TranslateTts {
    /// Create a client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(settings: SynthesisSettings) -> SpeechResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("wspeech/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SpeechError::configuration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, settings })
    }

    /// Endpoint this client calls
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.settings.endpoint
    }
}

impl SynthesisService for TranslateTts {
    fn synthesize(&self, text: &str, language: &str) -> SpeechResult<AudioArtifact> {
        if text.trim().is_empty() {
            return Err(SpeechError::invalid_input("Cannot synthesize empty text"));
        }

        let text_len = text.chars().count().to_string();
        let response = self
            .client
            .get(&self.settings.endpoint)
            .query(&[
                ("ie", "UTF-8"),
                ("q", text),
                ("tl", language),
                ("client", self.settings.client.as_str()),
                ("total", "1"),
                ("idx", "0"),
                ("textlen", text_len.as_str()),
            ])
            .send()?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SpeechError::network(
                "Synthesis quota exceeded (HTTP 429); try again later",
            ));
        }
        if !status.is_success() {
            return Err(SpeechError::network(format!(
                "Synthesis request failed with HTTP {status}"
            )));
        }

        let audio = response.bytes()?;
        if audio.is_empty() {
            return Err(SpeechError::synthesis("Synthesis service returned no audio"));
        }

        let clip = AudioArtifact::create("mp3")?;
        std::fs::write(clip.path(), &audio)?;
        debug!("Synthesized {} bytes to {}", audio.len(), clip.path().display());
        Ok(clip)
    }
}
