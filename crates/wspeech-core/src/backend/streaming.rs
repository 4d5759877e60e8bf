//! Network synthesis with local playback.

use super::{BackendKind, PauseMode, Rendered, SpeechBackend};
use crate::artifact::AudioArtifact;
use crate::chunker::Chunk;
use crate::config::SpeechConfig;
use crate::error::{SpeechError, SpeechResult};
use crate::session::SessionSignals;
use crate::sink::AudioSink;
use crate::synthesis::SynthesisService;
use crate::tempo::{TempoAdjuster, TempoFilter};
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Backend that renders chunks to clips and plays them through a sink.
///
/// `render` runs on the prefetch thread and `play` on the playback thread.
/// The sink is locked per operation so pause and stop from the command
/// surface are never blocked behind a playing clip.
pub struct StreamingBackend<S, K, F> {
    service: S,
    sink: Mutex<K>,
    adjuster: TempoAdjuster<F>,
    language: String,
    baseline_rate: u32,
    poll_interval: Duration,
}

impl<S, K, F> StreamingBackend<S, K, F>
where
    S: SynthesisService,
    K: AudioSink,
    F: TempoFilter,
{
    /// Create a streaming backend
    #[must_use]
    pub fn new(service: S, sink: K, adjuster: TempoAdjuster<F>) -> Self {
        Self {
            service,
            sink: Mutex::new(sink),
            adjuster,
            language: "en".to_string(),
            baseline_rate: crate::BASELINE_RATE,
            poll_interval: crate::DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the synthesis language
    #[must_use]
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Set the rate the service speaks at, used to derive tempo ratios
    #[must_use]
    pub const fn with_baseline_rate(mut self, baseline_rate: u32) -> Self {
        self.baseline_rate = baseline_rate;
        self
    }

    /// Set how often playback completion is polled
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run `op` against the sink
    pub fn with_sink<R>(&self, op: impl FnOnce(&mut K) -> R) -> R {
        op(&mut self.sink.lock())
    }

    fn release_sink(&self) {
        let mut sink = self.sink.lock();
        if let Err(e) = sink.stop() {
            warn!("Failed to stop playback: {e}");
        }
        if let Err(e) = sink.unload() {
            warn!("Failed to unload clip: {e}");
        }
    }
}

impl<S, K, F> SpeechBackend for StreamingBackend<S, K, F>
where
    S: SynthesisService,
    K: AudioSink,
    F: TempoFilter,
{
    fn kind(&self) -> BackendKind {
        BackendKind::Streaming
    }

    fn pause_mode(&self) -> PauseMode {
        PauseMode::InPlace
    }

    fn render(
        &self,
        chunk: &Chunk,
        config: &SpeechConfig,
        signals: &SessionSignals,
    ) -> SpeechResult<Rendered> {
        let clip = self.service.synthesize(&chunk.text, &self.language)?;
        if signals.is_stopped() {
            debug!("Chunk {} synthesized after stop, discarding", chunk.index);
            drop(clip);
            return Err(SpeechError::synthesis("Session stopped during synthesis"));
        }
        let ratio = config.speed_ratio(self.baseline_rate);
        debug!("Chunk {} synthesized, tempo ratio {ratio:.3}", chunk.index);
        Ok(Rendered::Audio(self.adjuster.adjust(clip, ratio)))
    }

    fn play(&self, artifact: AudioArtifact, signals: &SessionSignals) -> SpeechResult<()> {
        if !signals.wait_while_paused() {
            return Ok(());
        }

        {
            let mut sink = self.sink.lock();
            if signals.is_stopped() {
                return Ok(());
            }
            sink.load(artifact.path())?;
            sink.play()?;
            // A pause that landed between the gate check and play() found an
            // idle sink; apply it now.
            if signals.is_paused() {
                sink.pause()?;
            }
        }

        while signals.wait_while_paused() {
            if !self.sink.lock().is_busy() {
                break;
            }
            std::thread::sleep(self.poll_interval);
        }

        self.release_sink();
        drop(artifact);
        Ok(())
    }

    fn pause(&self) -> SpeechResult<()> {
        self.sink.lock().pause()
    }

    fn resume(&self) -> SpeechResult<()> {
        self.sink.lock().unpause()
    }

    fn stop(&self) -> SpeechResult<()> {
        let mut sink = self.sink.lock();
        sink.stop()?;
        sink.unload()
    }
}
