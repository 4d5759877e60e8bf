//! Per-session signals shared between the command surface and the workers.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Binary gate that blocks readers while closed.
///
/// Waiters wake at least once per poll interval so they can notice a stop
/// request even if nobody reopens the gate.
#[derive(Debug)]
pub struct PauseGate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl PauseGate {
    /// Create an open gate
    #[must_use]
    pub fn new() -> Self {
        Self {
            open: Mutex::new(true),
            changed: Condvar::new(),
        }
    }

    /// Open the gate and wake every waiter
    pub fn open(&self) {
        *self.open.lock() = true;
        self.changed.notify_all();
    }

    /// Close the gate
    pub fn close(&self) {
        *self.open.lock() = false;
    }

    /// Whether the gate is open
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }

    /// Block until the gate opens or `interrupted` returns true.
    ///
    /// Returns `true` if the gate is open on return.
    pub fn wait_open(&self, poll: Duration, interrupted: impl Fn() -> bool) -> bool {
        let mut open = self.open.lock();
        while !*open {
            if interrupted() {
                return false;
            }
            self.changed.wait_for(&mut open, poll);
        }
        true
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Stop flag and pause gate of one speak session
#[derive(Debug)]
pub struct SessionSignals {
    id: Uuid,
    stop: AtomicBool,
    gate: PauseGate,
    poll_interval: Duration,
}

impl SessionSignals {
    /// Create signals for a new session
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            stop: AtomicBool::new(false),
            gate: PauseGate::new(),
            poll_interval,
        }
    }

    /// Session identifier
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Interval at which workers re-check these signals
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Request stop. One-way; also forces the gate open so no waiter stays blocked.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.gate.open();
    }

    /// Whether stop has been requested
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Close the gate. Ignored once stop has been requested.
    pub fn pause(&self) {
        if !self.is_stopped() {
            self.gate.close();
        }
    }

    /// Open the gate
    pub fn resume(&self) {
        self.gate.open();
    }

    /// Whether the gate is closed
    #[must_use]
    pub fn is_paused(&self) -> bool {
        !self.gate.is_open()
    }

    /// Block while paused. Returns `false` if the session was stopped.
    pub fn wait_while_paused(&self) -> bool {
        self.gate
            .wait_open(self.poll_interval, || self.is_stopped());
        !self.is_stopped()
    }

    /// Sleep one poll interval. Returns `false` if the session was stopped.
    pub fn tick(&self) -> bool {
        std::thread::sleep(self.poll_interval);
        !self.is_stopped()
    }
}
