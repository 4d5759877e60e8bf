//! Human-readable progress messages.
//!
//! Workers and the transport controller report through a [`StatusReporter`];
//! the host decides where messages go (a label, stdout, the log).

use parking_lot::Mutex;
use tracing::info;

/// Shown when a session starts
pub const STARTING: &str = "Starting…";
/// Shown when playback continues after a pause
pub const RESUMED: &str = "Speaking…";
/// Shown when a session is paused
pub const PAUSED: &str = "Paused — press Resume to continue";
/// Shown when a session is stopped
pub const STOPPED: &str = "Stopped";
/// Shown when every chunk has been spoken
pub const DONE: &str = "Done — press Speak to read again";
/// Shown when speak is requested with no text
pub const EMPTY_TEXT: &str = "Please enter some text first.";

/// Progress message for chunk `index` (zero-based) of `total`
#[must_use]
pub fn speaking(index: usize, total: usize) -> String {
    format!("Speaking… ({}/{total})", index + 1)
}

/// Message for a chunk that could not be spoken
#[must_use]
pub fn skipped(index: usize, total: usize, error: &dyn std::fmt::Display) -> String {
    format!("Skipped chunk {}/{total}: {error}", index + 1)
}

/// Message for a session-ending failure
#[must_use]
pub fn error(error: &dyn std::fmt::Display) -> String {
    format!("Error: {error}")
}

/// Receives status strings.
///
/// Reports may be delivered while the controller holds its locks, so
/// implementations must not call back into the controller.
pub trait StatusReporter: Send + Sync {
    /// Publish a status message
    fn report(&self, status: &str);
}

impl<F> StatusReporter for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, status: &str) {
        self(status);
    }
}

/// Reporter that writes statuses to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl StatusReporter for TracingReporter {
    fn report(&self, status: &str) {
        info!(target: "wspeech::status", "{status}");
    }
}

/// Reporter that keeps every status in memory
#[derive(Debug, Default)]
pub struct RecordingReporter {
    entries: Mutex<Vec<String>>,
}

impl RecordingReporter {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every status so far, oldest first
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Most recent status
    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.entries.lock().last().cloned()
    }
}

impl StatusReporter for RecordingReporter {
    fn report(&self, status: &str) {
        self.entries.lock().push(status.to_string());
    }
}
