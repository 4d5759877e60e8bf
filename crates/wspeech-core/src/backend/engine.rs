//! In-process speech engine adapter.

use super::{BackendKind, PauseMode, Rendered, SpeechBackend};
use crate::chunker::Chunk;
use crate::config::SpeechConfig;
use crate::error::SpeechResult;
use crate::session::SessionSignals;
use crate::voice::{EngineVoice, VoiceHints};
use tracing::{debug, info, warn};

/// Engine property holding the selected voice id
pub const PROPERTY_VOICE: &str = "voice";
/// Engine property holding the rate in words per minute
pub const PROPERTY_RATE: &str = "rate";
/// Engine property holding the pitch
pub const PROPERTY_PITCH: &str = "pitch";

/// Value of an engine property
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Numeric property such as rate or pitch
    Number(f64),
    /// Textual property such as a voice id
    Text(String),
}

/// Speech engine living in the same process.
///
/// `say` queues an utterance and `run_and_wait` blocks until the queue has
/// been spoken. `stop` may be called from another thread and must make a
/// running `run_and_wait` return.
pub trait SpeechEngine: Send + Sync {
    /// Voices the engine offers
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot enumerate voices
    fn list_voices(&self) -> SpeechResult<Vec<EngineVoice>>;

    /// Set an engine property
    ///
    /// # Errors
    ///
    /// Returns an error if the property is unknown or the value rejected
    fn set(&self, property: &str, value: PropertyValue) -> SpeechResult<()>;

    /// Queue `text` for speaking
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be queued
    fn say(&self, text: &str) -> SpeechResult<()>;

    /// Speak everything queued, blocking until done or stopped
    ///
    /// # Errors
    ///
    /// Returns an error if speaking fails
    fn run_and_wait(&self) -> SpeechResult<()>;

    /// Abort the current utterance
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be stopped
    fn stop(&self) -> SpeechResult<()>;
}

/// Backend that speaks each chunk synchronously through a [`SpeechEngine`].
///
/// Engines cannot suspend mid-utterance, so pause takes effect at the next
/// chunk boundary.
pub struct EngineBackend {
    engine: Box<dyn SpeechEngine>,
    hints: VoiceHints,
}

impl EngineBackend {
    /// Wrap an engine
    #[must_use]
    pub fn new(engine: Box<dyn SpeechEngine>) -> Self {
        Self {
            engine,
            hints: VoiceHints::default(),
        }
    }

    /// Use custom voice matching hints
    #[must_use]
    pub fn with_hints(mut self, hints: VoiceHints) -> Self {
        self.hints = hints;
        self
    }
}

impl SpeechBackend for EngineBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Engine
    }

    fn pause_mode(&self) -> PauseMode {
        PauseMode::ChunkBoundary
    }

    fn prepare(&self, config: &SpeechConfig) -> SpeechResult<()> {
        let voices = self.engine.list_voices()?;
        match self.hints.select(&voices, config.voice) {
            Some(voice) => {
                info!("Selected engine voice {} ({})", voice.name, voice.id);
                self.engine
                    .set(PROPERTY_VOICE, PropertyValue::Text(voice.id.clone()))?;
            }
            None => warn!(
                "No {} voice among {} engine voices; keeping the engine default",
                config.voice,
                voices.len()
            ),
        }
        Ok(())
    }

    fn render(
        &self,
        chunk: &Chunk,
        config: &SpeechConfig,
        signals: &SessionSignals,
    ) -> SpeechResult<Rendered> {
        if signals.is_stopped() {
            return Ok(Rendered::Spoken);
        }
        self.engine
            .set(PROPERTY_RATE, PropertyValue::Number(f64::from(config.rate)))?;
        self.engine
            .set(PROPERTY_PITCH, PropertyValue::Number(f64::from(config.pitch)))?;
        self.engine.say(&chunk.text)?;
        debug!("Engine speaking chunk {}", chunk.index);
        self.engine.run_and_wait()?;
        Ok(Rendered::Spoken)
    }

    fn pause(&self) -> SpeechResult<()> {
        Ok(())
    }

    fn resume(&self) -> SpeechResult<()> {
        Ok(())
    }

    fn stop(&self) -> SpeechResult<()> {
        self.engine.stop()
    }
}
