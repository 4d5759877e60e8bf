//! Bounded hand-off between the synthesis and playback threads.
//!
//! The producer blocks once `capacity` clips are waiting, so synthesis never
//! runs more than a few chunks ahead of playback. Both ends wake once per
//! poll interval to notice a stop request. Items dropped on the way (a send
//! abandoned on stop, or clips still queued when the receiver goes away)
//! delete their audio files.

use crate::artifact::AudioArtifact;
use crate::chunker::Chunk;
use crate::error::SpeechError;
use crate::session::SessionSignals;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Message passed from synthesis to playback
#[derive(Debug)]
pub enum Prefetched {
    /// Clip ready to play
    Ready {
        /// Chunk the clip speaks
        chunk: Chunk,
        /// Synthesized audio
        artifact: AudioArtifact,
    },
    /// Chunk that could not be synthesized
    Skipped {
        /// Chunk that failed
        chunk: Chunk,
        /// Why it failed
        error: SpeechError,
    },
    /// No more chunks will follow
    Finished,
}

/// Occupancy statistics shared by both ends of a queue
#[derive(Debug, Default)]
pub struct QueueStats {
    high_water: AtomicUsize,
    sent: AtomicUsize,
}

impl QueueStats {
    /// Most items ever waiting at once
    #[must_use]
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    /// Items accepted by the queue
    #[must_use]
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    fn record(&self, queued: usize) {
        self.sent.fetch_add(1, Ordering::SeqCst);
        self.high_water.fetch_max(queued, Ordering::SeqCst);
    }
}

/// Producer end
#[derive(Debug)]
pub struct PrefetchSender {
    sender: Sender<Prefetched>,
    stats: Arc<QueueStats>,
}

/// Consumer end
#[derive(Debug)]
pub struct PrefetchReceiver {
    receiver: Receiver<Prefetched>,
}

/// Create a queue holding at most `capacity` waiting items
#[must_use]
pub fn channel(capacity: usize, stats: Arc<QueueStats>) -> (PrefetchSender, PrefetchReceiver) {
    let (sender, receiver) = bounded(capacity.max(1));
    (PrefetchSender { sender, stats }, PrefetchReceiver { receiver })
}

impl PrefetchSender {
    /// Queue `item`, blocking while the queue is full.
    ///
    /// Returns `false` if the session stopped or the receiver is gone; the
    /// item is dropped in that case.
    pub fn send(&self, item: Prefetched, signals: &SessionSignals) -> bool {
        let mut item = item;
        loop {
            match self.sender.send_timeout(item, signals.poll_interval()) {
                Ok(()) => {
                    self.stats.record(self.sender.len());
                    return true;
                }
                Err(SendTimeoutError::Timeout(back)) => {
                    if signals.is_stopped() {
                        return false;
                    }
                    item = back;
                }
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }
}

impl PrefetchReceiver {
    /// Take the next item, blocking while the queue is empty.
    ///
    /// Returns `None` if the session stopped or the sender is gone.
    pub fn recv(&self, signals: &SessionSignals) -> Option<Prefetched> {
        loop {
            if signals.is_stopped() {
                return None;
            }
            match self.receiver.recv_timeout(signals.poll_interval()) {
                Ok(item) => return Some(item),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Items waiting right now
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether nothing is waiting
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
