//! Debounced link-health tracking.
//!
//! Every register read produces a [`ReadOutcome`]. The tracker turns that
//! stream into a connectivity flag that goes up on the first success and
//! only goes down once more than `threshold` reads in a row have failed.

use serde::Serialize;

/// Failed reads tolerated before the link is reported down.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Result of a single register read attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Success(Vec<u8>),
    Timeout,
    ProtocolError(String),
}

impl ReadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ReadOutcome::Success(_))
    }
}

/// Snapshot of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkState {
    pub is_connected: bool,
    pub consecutive_failures: u32,
}

/// Two-state (Up/Down) connectivity state machine, starting Down.
#[derive(Debug, Clone)]
pub struct LinkHealthTracker {
    connected: bool,
    consecutive_failures: u32,
    threshold: u32,
}

impl Default for LinkHealthTracker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

impl LinkHealthTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            connected: false,
            consecutive_failures: 0,
            threshold,
        }
    }

    /// Feed one outcome.
    ///
    /// Returns `Some(is_connected)` when the connectivity flag changed, and
    /// `None` otherwise.
    pub fn record(&mut self, outcome: &ReadOutcome) -> Option<bool> {
        let was_connected = self.connected;

        if outcome.is_success() {
            self.consecutive_failures = 0;
            self.connected = true;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            if self.consecutive_failures > self.threshold {
                self.connected = false;
            }
        }

        (self.connected != was_connected).then_some(self.connected)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn state(&self) -> LinkState {
        LinkState {
            is_connected: self.connected,
            consecutive_failures: self.consecutive_failures,
        }
    }
}
