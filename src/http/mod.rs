//! HTTP listener subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming connection
//!     → server.rs (axum-server, optional TLS)
//!     → drain.rs (mark Connection: close while draining)
//!     → timeout/trace layers
//!     → supplied router (management surface)
//! ```

pub mod drain;
pub mod server;

pub use server::{router, NbiServer, ServerError};
