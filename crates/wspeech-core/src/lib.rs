//! # wspeech core
//!
//! Chunked text-to-speech playback with pause, resume and stop.
//!
//! ## Features
//!
//! - Sentence-aware chunking so long text starts speaking quickly
//! - Network synthesis with bounded prefetch ahead of playback
//! - In-process engine and external program backends
//! - Tempo adjustment of synthesized clips to the requested rate
//! - Responsive transport control from any thread
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wspeech_core::{build_backend, Settings, TracingReporter, TransportController};
//!
//! fn main() -> wspeech_core::SpeechResult<()> {
//!     let settings = Settings::load(None)?;
//!     let backend = build_backend(&settings, None)?;
//!     let controller =
//!         TransportController::from_settings(&settings, Some(backend), Arc::new(TracingReporter))?;
//!
//!     controller.speak("Hello, world! This is a test.", settings.speech)?;
//!     controller.wait_idle(Duration::from_secs(60));
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod artifact;
pub mod backend;
pub mod chunker;
pub mod config;
pub mod error;
pub mod prefetch;
pub mod process;
pub mod reporter;
pub mod session;
pub mod sink;
pub mod synthesis;
pub mod tempo;
pub mod transport;
pub mod voice;

// Re-export main types for convenience
pub use artifact::AudioArtifact;
pub use backend::{
    build_backend, BackendChoice, BackendKind, EngineBackend, PauseMode, ProcessBackend,
    PropertyValue, Rendered, SpeechBackend, SpeechEngine, StreamingBackend,
};
pub use chunker::{Chunk, Chunker};
pub use config::{CommandSettings, Settings, SpeechConfig, SynthesisSettings};
pub use error::{SpeechError, SpeechResult};
pub use reporter::{RecordingReporter, StatusReporter, TracingReporter};
pub use session::SessionSignals;
pub use sink::{AudioSink, PlaybackState, PlayerSink};
pub use synthesis::{SynthesisService, TranslateTts};
pub use tempo::{FfmpegFilter, TempoAdjuster, TempoFilter};
pub use transport::{TransportController, TransportState};
pub use voice::{EngineVoice, VoiceHints, VoiceTag};

use std::time::Duration;

/// Version information for the wspeech-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default maximum chunk length in characters
pub const DEFAULT_CHUNK_SIZE: usize = 180;

/// Speaking rate of the network synthesis service, in words per minute
pub const BASELINE_RATE: u32 = 160;

/// Default number of synthesized clips allowed to wait ahead of playback
pub const DEFAULT_PREFETCH_CAPACITY: usize = 3;

/// Tempo ratios closer than this to 1.0 leave clips untouched
pub const TEMPO_TOLERANCE: f64 = 0.04;

/// Default interval at which workers poll for stop, pause and playback completion
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(40);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_CHUNK_SIZE, 180);
        assert_eq!(BASELINE_RATE, 160);
        assert_eq!(DEFAULT_PREFETCH_CAPACITY, 3);
        assert!(TEMPO_TOLERANCE > 0.0 && TEMPO_TOLERANCE < 0.1);
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_defaults_agree() {
        let settings = Settings::default();
        assert_eq!(settings.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(settings.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert_eq!(Chunker::default().max_len(), DEFAULT_CHUNK_SIZE);
    }
}
