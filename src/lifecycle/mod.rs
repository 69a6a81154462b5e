//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (worker.rs):
//!     Connect stores + bind listener + start signaling → Running
//!
//! Shutdown (worker.rs, shutdown.rs):
//!     Stop trigger → drain → ordered teardown raced against the watchdog
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → request stop
//! ```
//!
//! # Design Decisions
//! - Ordered teardown: signaling session, listener, then stores and helpers
//! - Shutdown has a single global deadline: forceful exit after 5 seconds
//! - Two racing stop triggers collapse into one shutdown pass

pub mod shutdown;
pub mod signals;
pub mod worker;

pub use shutdown::{Shutdown, StopReason};
pub use worker::{
    FaultReporter, StartupError, Worker, WorkerOptions, WorkerOutcome, WorkerProcessState,
    SHUTDOWN_WATCHDOG,
};
