//! Speech backends behind one capability interface.
//!
//! Three adapters exist:
//!
//! - [`StreamingBackend`] synthesizes each chunk to an audio file over the
//!   network and plays it through an [`AudioSink`](crate::sink::AudioSink).
//!   The transport controller prefetches clips on a second thread.
//! - [`EngineBackend`] drives an in-process [`SpeechEngine`] that speaks each
//!   chunk synchronously.
//! - [`ProcessBackend`] runs one external speech program per chunk.
//!
//! One backend is chosen at startup ([`build_backend`]) and shared as an
//! `Arc<dyn SpeechBackend>` between the command surface and the workers.

pub mod engine;
pub mod process;
pub mod streaming;

pub use engine::{EngineBackend, PropertyValue, SpeechEngine};
pub use process::ProcessBackend;
pub use streaming::StreamingBackend;

use crate::artifact::AudioArtifact;
use crate::chunker::Chunk;
use crate::config::{Settings, SpeechConfig};
use crate::error::{SpeechError, SpeechResult};
use crate::session::SessionSignals;
use crate::sink::PlayerSink;
use crate::synthesis::TranslateTts;
use crate::tempo::{FfmpegFilter, TempoAdjuster};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Concrete backend variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Network synthesis with local playback
    Streaming,
    /// In-process speech engine
    Engine,
    /// External speech program
    Process,
}

impl BackendKind {
    /// Human-readable description for status displays
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Streaming => "Google TTS (online · chunked)",
            Self::Engine => "In-process speech engine",
            Self::Process => "espeak-ng (offline)",
        }
    }

    /// Whether synthesis and playback run as separate pipeline stages
    #[must_use]
    pub const fn is_streaming(self) -> bool {
        matches!(self, Self::Streaming)
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Streaming => write!(f, "streaming"),
            Self::Engine => write!(f, "engine"),
            Self::Process => write!(f, "process"),
        }
    }
}

/// Backend selection from settings or the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// First available backend, in the order streaming, engine, process
    #[default]
    Auto,
    /// Network synthesis with local playback
    Streaming,
    /// In-process speech engine
    Engine,
    /// External speech program
    Process,
}

impl FromStr for BackendChoice {
    type Err = SpeechError;

    fn from_str(s: &str) -> SpeechResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "streaming" => Ok(Self::Streaming),
            "engine" => Ok(Self::Engine),
            "process" | "espeak" | "espeak-ng" => Ok(Self::Process),
            other => Err(SpeechError::configuration(format!(
                "Unknown backend: {other}. Available: auto, streaming, engine, process"
            ))),
        }
    }
}

/// How a backend honours pause requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseMode {
    /// Audio is suspended mid-chunk and continues from the same point
    InPlace,
    /// Pause takes effect only between chunks
    ChunkBoundary,
    /// The current chunk is abandoned and restarted from its beginning on resume
    RestartChunk,
}

/// Result of rendering one chunk
#[derive(Debug)]
pub enum Rendered {
    /// Synthesized clip waiting to be played with [`SpeechBackend::play`]
    Audio(AudioArtifact),
    /// The chunk was spoken directly
    Spoken,
}

/// Capability surface shared by every backend.
///
/// Methods take `&self`: the worker renders and plays while the command
/// surface pauses, resumes and stops from another thread.
pub trait SpeechBackend: Send + Sync {
    /// Which variant this is
    fn kind(&self) -> BackendKind;

    /// Human-readable description
    fn label(&self) -> &str {
        self.kind().label()
    }

    /// How pause requests are honoured
    fn pause_mode(&self) -> PauseMode;

    /// Per-session setup, run once before the first chunk
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be configured
    fn prepare(&self, _config: &SpeechConfig) -> SpeechResult<()> {
        Ok(())
    }

    /// Synthesize `chunk` to a clip, or speak it synchronously
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk cannot be synthesized or spoken
    fn render(
        &self,
        chunk: &Chunk,
        config: &SpeechConfig,
        signals: &SessionSignals,
    ) -> SpeechResult<Rendered>;

    /// Play a clip produced by [`SpeechBackend::render`], blocking until it
    /// finishes or the session stops. The clip is deleted on return.
    ///
    /// # Errors
    ///
    /// Returns an error if playback fails
    fn play(&self, artifact: AudioArtifact, _signals: &SessionSignals) -> SpeechResult<()> {
        drop(artifact);
        Ok(())
    }

    /// Suspend audio output
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be suspended
    fn pause(&self) -> SpeechResult<()>;

    /// Continue suspended audio output
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be resumed
    fn resume(&self) -> SpeechResult<()>;

    /// Halt all audio output and release per-session resources
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be halted
    fn stop(&self) -> SpeechResult<()>;
}

/// Streaming backend built from settings
pub type DefaultStreamingBackend = StreamingBackend<TranslateTts, PlayerSink, FfmpegFilter>;

fn streaming_backend(settings: &Settings) -> SpeechResult<DefaultStreamingBackend> {
    if !settings.player.is_available() {
        return Err(SpeechError::configuration(format!(
            "Audio player '{}' not found",
            settings.player.program
        )));
    }
    if !settings.tempo.is_available() {
        warn!(
            "Tempo tool '{}' not found; clips will play at the service's natural speed",
            settings.tempo.program
        );
    }
    let service = TranslateTts::new(settings.synthesis.clone())?;
    let sink = PlayerSink::new(settings.player.program.clone(), settings.player.args.clone());
    let adjuster = TempoAdjuster::with_tolerance(
        FfmpegFilter::new(&settings.tempo.program),
        settings.tempo_tolerance,
    );
    Ok(StreamingBackend::new(service, sink, adjuster)
        .with_language(&settings.language)
        .with_baseline_rate(settings.baseline_rate)
        .with_poll_interval(settings.poll_interval()))
}

fn engine_backend(
    settings: &Settings,
    engine: Option<Box<dyn SpeechEngine>>,
) -> SpeechResult<EngineBackend> {
    engine
        .map(|engine| EngineBackend::new(engine).with_hints(settings.voices.clone()))
        .ok_or_else(|| SpeechError::configuration("No in-process speech engine provided"))
}

fn process_backend(settings: &Settings) -> SpeechResult<ProcessBackend> {
    if !settings.process.is_available() {
        return Err(SpeechError::configuration(format!(
            "Speech program '{}' not found",
            settings.process.program
        )));
    }
    Ok(ProcessBackend::new(settings.process.clone()))
}

/// Select and construct the backend named by `settings.backend`.
///
/// `engine` is the in-process engine the host application provides, if any.
/// With [`BackendChoice::Auto`] the first available backend wins, in the order
/// streaming, engine, process.
///
/// # Errors
///
/// Returns a configuration error if the requested backend, or with `Auto`
/// every backend, is unavailable
pub fn build_backend(
    settings: &Settings,
    engine: Option<Box<dyn SpeechEngine>>,
) -> SpeechResult<Arc<dyn SpeechBackend>> {
    let backend: Arc<dyn SpeechBackend> = match settings.backend {
        BackendChoice::Streaming => Arc::new(streaming_backend(settings)?),
        BackendChoice::Engine => Arc::new(engine_backend(settings, engine)?),
        BackendChoice::Process => Arc::new(process_backend(settings)?),
        BackendChoice::Auto => {
            if let Ok(backend) = streaming_backend(settings) {
                Arc::new(backend)
            } else if let Some(engine) = engine {
                Arc::new(engine_backend(settings, Some(engine))?)
            } else if let Ok(backend) = process_backend(settings) {
                Arc::new(backend)
            } else {
                return Err(SpeechError::configuration(
                    "No TTS backend available. Install: sudo apt install espeak-ng",
                ));
            }
        }
    };
    info!("Using backend: {}", backend.label());
    Ok(backend)
}
