//! Process role dispatch.
//!
//! # Data Flow
//! ```text
//! launch
//!     → master path (master.rs): spawn N workers, relay termination
//!       signals as stop commands, respawn crashed workers
//!     → worker path (control.rs + lifecycle): run listener + signaling,
//!       watch the supervisor channel for stop/EOF
//! ```
//!
//! Workers share no in-process memory with the master or each other; each
//! owns its own listener and signaling session.

pub mod control;
pub mod master;

/// Environment marker distinguishing worker processes from the master.
pub const WORKER_ENV: &str = "ACS_NBI_WORKER";

/// Whether this process was spawned as a worker.
pub fn is_worker_process() -> bool {
    std::env::var_os(WORKER_ENV).is_some()
}
