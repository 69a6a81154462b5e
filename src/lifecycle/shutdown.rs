//! Stop-trigger coordination.

use std::fmt;

use tokio::sync::broadcast;

/// Why a stop was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An OS termination signal.
    Signal,
    /// The supervising master asked us to stop or went away.
    Supervisor,
    /// An uncaught runtime fault.
    Fault,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Signal => write!(f, "signal"),
            StopReason::Supervisor => write!(f, "supervisor"),
            StopReason::Fault => write!(f, "fault"),
        }
    }
}

/// Coordinator for stop triggers.
///
/// Provides a broadcast channel that long-running tasks subscribe to.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<StopReason>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(4);
        Self { tx }
    }

    /// Subscribe to stop triggers.
    pub fn subscribe(&self) -> broadcast::Receiver<StopReason> {
        self.tx.subscribe()
    }

    /// Trigger a stop. A trigger with no subscribers is not an error.
    pub fn trigger(&self, reason: StopReason) {
        let _ = self.tx.send(reason);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
