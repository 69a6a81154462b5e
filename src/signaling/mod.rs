//! Out-of-band connection-request signaling.
//!
//! # Data Flow
//! ```text
//! Worker startup
//!     → session.rs (open authenticated session, register endpoint address)
//!     → transport.rs (seam) / xmpp.rs (production client)
//!
//! Connection request (from the management surface)
//!     → sender.rs (no-op without a session)
//!     → stanza.rs (build iq payload, fresh 32-hex-char id)
//!     → active session send, fire-and-forget
//! ```
//!
//! # Design Decisions
//! - Signaling is optional; unconfigured host/port is a successful no-op
//! - One session per process, owned by the worker lifecycle controller
//! - Restart closes the previous session before opening the replacement
//! - Inbound stanzas are observed, never dispatched

use std::time::Duration;
use thiserror::Error;

pub mod sender;
pub mod session;
pub mod stanza;
pub mod transport;
pub mod xmpp;

pub use sender::ConnectionRequestSender;
pub use session::{ConnectionState, SignalingIdentity, SignalingSession};
pub use stanza::{new_request_id, ConnectionRequestMessage, CONNECTION_REQUEST_NS};
pub use transport::{SignalingTransport, TransportEvent, TransportSession};
pub use xmpp::XmppTransport;

/// Errors from the signaling subsystem.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Transport-level connect failure.
    #[error("signaling connect failed: {0}")]
    Connect(String),

    /// The server rejected our credentials or mechanism.
    #[error("signaling authentication failed: {0}")]
    Auth(String),

    /// Sending a stanza failed.
    #[error("signaling send failed: {0}")]
    Send(String),

    /// Closing the session failed.
    #[error("signaling close failed: {0}")]
    Close(String),

    /// The transport closed before the session came online.
    #[error("signaling transport closed before coming online")]
    Closed,

    /// Negotiation did not finish in time.
    #[error("signaling connect timed out after {0:?}")]
    Timeout(Duration),
}
