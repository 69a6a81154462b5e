//! Northbound-interface process of a CWMP Auto Configuration Server.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌───────────────────────────────────────────────┐
//!                  │                 MASTER PROCESS                │
//!                  │  cluster::master: spawn N workers, relay      │
//!                  │  termination signals, respawn on crash        │
//!                  └───────────────┬───────────────────────────────┘
//!                                  │ spawns (stdin = control channel)
//!                  ┌───────────────▼───────────────────────────────┐
//!                  │                 WORKER PROCESS                │
//!                  │                                               │
//!   Operator ────▶ │  http (listener, drain marking)               │
//!                  │  lifecycle (state machine, 5 s watchdog)      │
//!                  │  signaling (session + connection requests) ───┼──▶ Devices
//!                  │  stores / extensions (collaborator seams)     │
//!                  └───────────────────────────────────────────────┘
//! ```
//!
//! The signaling channel exists so the server can ask a device behind NAT to
//! contact it; the CWMP session itself travels over HTTP and is handled by
//! the management surface, not here.

// Core subsystems
pub mod cluster;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod signaling;

// Collaborator seams
pub mod extensions;
pub mod stores;

pub use config::NbiConfig;
pub use http::NbiServer;
pub use lifecycle::{Worker, WorkerOptions, WorkerOutcome, WorkerProcessState};
pub use signaling::{ConnectionRequestSender, SignalingSession};
