//! Speak, pause, resume and stop for one utterance at a time.
//!
//! A [`TransportController`] owns the session lifecycle. `speak` splits the
//! text into chunks and hands them to a worker thread; the command methods
//! may be called from any thread and return without waiting for audio,
//! except `stop`, which waits for the worker to exit.
//!
//! Streaming backends get a second thread that synthesizes ahead of
//! playback through a bounded [prefetch](crate::prefetch) queue. Every other
//! backend renders chunks one after another on the worker.

use crate::backend::{Rendered, SpeechBackend};
use crate::chunker::{Chunk, Chunker};
use crate::config::{Settings, SpeechConfig};
use crate::error::{SpeechError, SpeechResult};
use crate::prefetch::{self, Prefetched, PrefetchSender, QueueStats};
use crate::reporter::{self, StatusReporter};
use crate::session::SessionSignals;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lifecycle of the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportState {
    /// No session
    Idle,
    /// Session accepted, first chunk not yet playing
    Starting,
    /// Chunks are being spoken
    Speaking,
    /// Output suspended until resume
    Paused,
    /// Stop requested, waiting for the worker to exit
    Stopping,
    /// Every chunk has been spoken; resets to idle immediately
    Done,
}

impl TransportState {
    /// Whether a session is in progress
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Speaking | Self::Paused)
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Starting => write!(f, "Starting"),
            Self::Speaking => write!(f, "Speaking"),
            Self::Paused => write!(f, "Paused"),
            Self::Stopping => write!(f, "Stopping"),
            Self::Done => write!(f, "Done"),
        }
    }
}

struct ActiveSession {
    signals: Arc<SessionSignals>,
    stats: Arc<QueueStats>,
    worker: JoinHandle<()>,
}

/// Command surface for chunked playback
pub struct TransportController {
    backend: Option<Arc<dyn SpeechBackend>>,
    reporter: Arc<dyn StatusReporter>,
    chunker: Chunker,
    poll_interval: Duration,
    prefetch_capacity: usize,
    state: Arc<Mutex<TransportState>>,
    active: Mutex<Option<ActiveSession>>,
}

impl TransportController {
    /// Create a controller. `backend` is `None` when no backend is
    /// available; every `speak` then fails with a configuration error.
    #[must_use]
    pub fn new(backend: Option<Arc<dyn SpeechBackend>>, reporter: Arc<dyn StatusReporter>) -> Self {
        Self {
            backend,
            reporter,
            chunker: Chunker::default(),
            poll_interval: crate::DEFAULT_POLL_INTERVAL,
            prefetch_capacity: crate::DEFAULT_PREFETCH_CAPACITY,
            state: Arc::new(Mutex::new(TransportState::Idle)),
            active: Mutex::new(None),
        }
    }

    /// Create a controller using chunk size, poll interval and prefetch
    /// capacity from `settings`
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid
    pub fn from_settings(
        settings: &Settings,
        backend: Option<Arc<dyn SpeechBackend>>,
        reporter: Arc<dyn StatusReporter>,
    ) -> SpeechResult<Self> {
        settings.validate()?;
        Ok(Self::new(backend, reporter)
            .with_chunker(Chunker::new(settings.chunk_size)?)
            .with_poll_interval(settings.poll_interval())
            .with_prefetch_capacity(settings.prefetch_capacity))
    }

    /// Use a custom chunker
    #[must_use]
    pub const fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Set how often workers re-check pause and stop
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set how many clips may wait ahead of playback
    #[must_use]
    pub fn with_prefetch_capacity(mut self, capacity: usize) -> Self {
        self.prefetch_capacity = capacity.max(1);
        self
    }

    /// Description of the active backend
    #[must_use]
    pub fn backend_label(&self) -> Option<&str> {
        self.backend.as_deref().map(SpeechBackend::label)
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> TransportState {
        *self.state.lock()
    }

    /// Most clips that waited in the prefetch queue during the latest session
    #[must_use]
    pub fn queue_high_water(&self) -> Option<usize> {
        self.active
            .lock()
            .as_ref()
            .map(|session| session.stats.high_water())
    }

    fn set_state(&self, next: TransportState) {
        let mut state = self.state.lock();
        debug!("Transport {} -> {next}", *state);
        *state = next;
    }

    /// Start speaking `text`, stopping any session already in progress.
    ///
    /// Returns the id of the new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is empty, the configuration is invalid,
    /// no backend is available or the worker cannot be started
    pub fn speak(&self, text: &str, config: SpeechConfig) -> SpeechResult<Uuid> {
        if text.trim().is_empty() {
            self.reporter.report(reporter::EMPTY_TEXT);
            return Err(SpeechError::invalid_input("No text to speak"));
        }
        let Some(backend) = self.backend.clone() else {
            let err = SpeechError::configuration(
                "No TTS backend available. Install: sudo apt install espeak-ng",
            );
            self.reporter.report(&reporter::error(&err));
            return Err(err);
        };
        if let Err(err) = config.validate() {
            self.reporter.report(&reporter::error(&err));
            return Err(err);
        }

        let mut active = self.active.lock();
        if let Some(previous) = active.take() {
            info!("Stopping session {} for a new utterance", previous.signals.id());
            self.halt(previous);
        }

        let chunks = self.chunker.split(text);
        let signals = Arc::new(SessionSignals::new(self.poll_interval));
        let stats = Arc::new(QueueStats::default());
        let id = signals.id();
        info!(
            "Session {id}: {} chunks via {}",
            chunks.len(),
            backend.label()
        );

        self.set_state(TransportState::Starting);
        self.reporter.report(reporter::STARTING);

        let session = SessionWorker {
            backend,
            reporter: Arc::clone(&self.reporter),
            state: Arc::clone(&self.state),
            signals: Arc::clone(&signals),
            stats: Arc::clone(&stats),
            chunks,
            config,
            prefetch_capacity: self.prefetch_capacity,
        };
        let worker = thread::Builder::new()
            .name("wspeech-session".to_string())
            .spawn(move || session.run())
            .map_err(|e| {
                self.set_state(TransportState::Idle);
                let err = SpeechError::concurrency(format!("Failed to start session thread: {e}"));
                self.reporter.report(&reporter::error(&err));
                err
            })?;

        *active = Some(ActiveSession {
            signals,
            stats,
            worker,
        });
        Ok(id)
    }

    /// Suspend output. Returns `false` unless a session was starting or speaking.
    pub fn pause(&self) -> bool {
        let active = self.active.lock();
        let Some(session) = active.as_ref() else {
            return false;
        };
        {
            let mut state = self.state.lock();
            if !matches!(*state, TransportState::Starting | TransportState::Speaking) {
                return false;
            }
            *state = TransportState::Paused;
        }
        session.signals.pause();
        if let Some(backend) = &self.backend {
            if let Err(e) = backend.pause() {
                warn!("Backend failed to pause: {e}");
            }
        }
        self.reporter.report(reporter::PAUSED);
        true
    }

    /// Continue a paused session. Returns `false` unless a session was paused.
    pub fn resume(&self) -> bool {
        let active = self.active.lock();
        let Some(session) = active.as_ref() else {
            return false;
        };
        {
            let mut state = self.state.lock();
            if *state != TransportState::Paused {
                return false;
            }
            *state = TransportState::Speaking;
        }
        session.signals.resume();
        if let Some(backend) = &self.backend {
            if let Err(e) = backend.resume() {
                warn!("Backend failed to resume: {e}");
            }
        }
        self.reporter.report(reporter::RESUMED);
        true
    }

    /// Pause when speaking, resume when paused
    pub fn toggle_pause(&self) -> bool {
        match self.state() {
            TransportState::Paused => self.resume(),
            TransportState::Starting | TransportState::Speaking => self.pause(),
            _ => false,
        }
    }

    /// Halt the session and wait for its worker to exit.
    ///
    /// Returns `false` if no session was in progress.
    pub fn stop(&self) -> bool {
        let mut active = self.active.lock();
        let Some(session) = active.take() else {
            return false;
        };
        if !self.state().is_active() {
            // Finished on its own; only the thread handle is left.
            if session.worker.join().is_err() {
                warn!("Session worker panicked");
            }
            return false;
        }
        info!("Stopping session {}", session.signals.id());
        self.halt(session);
        self.reporter.report(reporter::STOPPED);
        true
    }

    fn halt(&self, session: ActiveSession) {
        self.set_state(TransportState::Stopping);
        session.signals.request_stop();
        if let Some(backend) = &self.backend {
            if let Err(e) = backend.stop() {
                warn!("Backend failed to stop: {e}");
            }
        }
        if session.worker.join().is_err() {
            warn!("Session worker panicked");
        }
        self.set_state(TransportState::Idle);
    }

    /// Block until the controller is idle or `timeout` elapses. Returns
    /// whether it is idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if self.state() == TransportState::Idle {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            thread::sleep(self.poll_interval);
        }
    }
}

impl Drop for TransportController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for TransportController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportController")
            .field("backend", &self.backend_label())
            .field("state", &self.state())
            .field("chunker", &self.chunker)
            .field("poll_interval", &self.poll_interval)
            .field("prefetch_capacity", &self.prefetch_capacity)
            .finish_non_exhaustive()
    }
}

/// Everything the worker thread of one session needs
struct SessionWorker {
    backend: Arc<dyn SpeechBackend>,
    reporter: Arc<dyn StatusReporter>,
    state: Arc<Mutex<TransportState>>,
    signals: Arc<SessionSignals>,
    stats: Arc<QueueStats>,
    chunks: Vec<Chunk>,
    config: SpeechConfig,
    prefetch_capacity: usize,
}

impl SessionWorker {
    fn run(self) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.speak()));
        let stopped = self.signals.is_stopped();
        // Releases the prefetch thread if it is still synthesizing.
        self.signals.request_stop();
        if stopped {
            debug!("Session {} stopped", self.signals.id());
            return;
        }

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(payload) => Some(panic_message(payload.as_ref())),
        };
        match failure {
            Some(message) => {
                error!("Session {} failed: {message}", self.signals.id());
                *self.state.lock() = TransportState::Idle;
                self.reporter.report(&reporter::error(&message));
            }
            None => {
                info!("Session {} done", self.signals.id());
                *self.state.lock() = TransportState::Done;
                self.reporter.report(reporter::DONE);
                *self.state.lock() = TransportState::Idle;
            }
        }
    }

    fn speak(&self) -> SpeechResult<()> {
        self.backend.prepare(&self.config)?;
        if self.backend.kind().is_streaming() {
            self.speak_prefetched()
        } else {
            self.speak_serial()
        }
    }

    /// Report progress under the state lock; silent while paused or stopping
    fn mark_speaking(&self, chunk: &Chunk) {
        let mut state = self.state.lock();
        match *state {
            TransportState::Starting => *state = TransportState::Speaking,
            TransportState::Speaking => {}
            _ => return,
        }
        self.reporter
            .report(&reporter::speaking(chunk.index, self.chunks.len()));
    }

    /// Report a failed chunk, or hand back errors that end the session
    fn skip(&self, chunk: &Chunk, error: SpeechError) -> SpeechResult<()> {
        if !error.is_recoverable() {
            return Err(error);
        }
        warn!(category = error.category(), "Skipping chunk {}: {error}", chunk.index);
        self.reporter
            .report(&reporter::skipped(chunk.index, self.chunks.len(), &error));
        Ok(())
    }

    fn speak_serial(&self) -> SpeechResult<()> {
        for chunk in &self.chunks {
            if !self.signals.wait_while_paused() {
                break;
            }
            self.mark_speaking(chunk);
            let result = self
                .backend
                .render(chunk, &self.config, &self.signals)
                .and_then(|rendered| match rendered {
                    Rendered::Audio(artifact) => self.backend.play(artifact, &self.signals),
                    Rendered::Spoken => Ok(()),
                });
            if self.signals.is_stopped() {
                break;
            }
            if let Err(e) = result {
                self.skip(chunk, e)?;
            }
        }
        Ok(())
    }

    fn speak_prefetched(&self) -> SpeechResult<()> {
        let (sender, receiver) = prefetch::channel(self.prefetch_capacity, Arc::clone(&self.stats));
        let producer = {
            let backend = Arc::clone(&self.backend);
            let signals = Arc::clone(&self.signals);
            let chunks = self.chunks.clone();
            let config = self.config;
            thread::Builder::new()
                .name("wspeech-prefetch".to_string())
                .spawn(move || prefetch_chunks(backend.as_ref(), &chunks, &config, &signals, &sender))
                .map_err(|e| {
                    SpeechError::concurrency(format!("Failed to start prefetch thread: {e}"))
                })?
        };

        while let Some(item) = receiver.recv(&self.signals) {
            match item {
                Prefetched::Finished => break,
                Prefetched::Skipped { chunk, error } => self.skip(&chunk, error)?,
                Prefetched::Ready { chunk, artifact } => {
                    if !self.signals.wait_while_paused() {
                        break;
                    }
                    self.mark_speaking(&chunk);
                    if let Err(e) = self.backend.play(artifact, &self.signals) {
                        if self.signals.is_stopped() {
                            break;
                        }
                        self.skip(&chunk, e)?;
                    }
                }
            }
            if self.signals.is_stopped() {
                break;
            }
        }
        drop(receiver);

        if self.signals.is_stopped() {
            // The producer may be inside a network call; it exits on its own.
            debug!("Detaching prefetch thread of session {}", self.signals.id());
        } else if producer.join().is_err() {
            return Err(SpeechError::concurrency("Prefetch thread panicked"));
        }
        Ok(())
    }
}

fn prefetch_chunks(
    backend: &dyn SpeechBackend,
    chunks: &[Chunk],
    config: &SpeechConfig,
    signals: &SessionSignals,
    sender: &PrefetchSender,
) {
    for chunk in chunks {
        if signals.is_stopped() {
            return;
        }
        let item = match backend.render(chunk, config, signals) {
            Ok(Rendered::Audio(artifact)) => Prefetched::Ready {
                chunk: chunk.clone(),
                artifact,
            },
            Ok(Rendered::Spoken) => continue,
            Err(error) => Prefetched::Skipped {
                chunk: chunk.clone(),
                error,
            },
        };
        if !sender.send(item, signals) {
            return;
        }
    }
    sender.send(Prefetched::Finished, signals);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "session worker panicked".to_string())
}
