//! Transport seam for the signaling session.
//!
//! The session logic is transport-agnostic: anything that can open an
//! authenticated connection, push events, and send raw stanzas can back a
//! [`super::SignalingSession`]. Production uses the XMPP transport in
//! [`super::xmpp`]; tests plug in a scripted mock.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::session::SignalingIdentity;
use super::SignalingError;

/// Events emitted by a transport connection.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The session is authenticated and bound to `address`.
    Online { address: String },
    /// The server closed the stream.
    Offline,
    /// Raw inbound traffic, observed but not dispatched.
    Stanza(String),
    /// A transport-level failure.
    Error(String),
}

/// Factory for signaling connections.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Open a connection for `identity`.
    ///
    /// The returned receiver yields connection events; the first decisive
    /// event is either [`TransportEvent::Online`] or [`TransportEvent::Error`].
    async fn connect(
        &self,
        identity: &SignalingIdentity,
    ) -> Result<(Arc<dyn TransportSession>, mpsc::Receiver<TransportEvent>), SignalingError>;
}

/// A live transport connection.
#[async_trait]
pub trait TransportSession: Send + Sync {
    /// Send a serialized stanza.
    async fn send(&self, stanza: &str) -> Result<(), SignalingError>;

    /// Close the connection.
    async fn stop(&self) -> Result<(), SignalingError>;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted transport for session and sender tests.
    pub struct MockTransport {
        /// Fail the connect call itself.
        pub fail_connect: bool,
        /// Emit an error event instead of coming online.
        pub reject_with: Option<String>,
        pub connects: AtomicUsize,
        pub sessions: Mutex<Vec<Arc<MockSession>>>,
    }

    pub struct MockSession {
        pub sent: Mutex<Vec<String>>,
        pub stops: AtomicUsize,
        pub fail_send: AtomicBool,
        // Keeps the event channel open for the observer task.
        pub events: mpsc::Sender<TransportEvent>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                fail_connect: false,
                reject_with: None,
                connects: AtomicUsize::new(0),
                sessions: Mutex::new(Vec::new()),
            }
        }

        pub fn rejecting(reason: &str) -> Self {
            Self {
                reject_with: Some(reason.to_string()),
                ..Self::new()
            }
        }

        pub fn last_session(&self) -> Arc<MockSession> {
            self.sessions.lock().unwrap().last().cloned().expect("no session connected")
        }
    }

    #[async_trait]
    impl SignalingTransport for MockTransport {
        async fn connect(
            &self,
            identity: &SignalingIdentity,
        ) -> Result<(Arc<dyn TransportSession>, mpsc::Receiver<TransportEvent>), SignalingError>
        {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect {
                return Err(SignalingError::Connect("connection refused".into()));
            }

            let (tx, rx) = mpsc::channel(16);
            let event = match &self.reject_with {
                Some(reason) => TransportEvent::Error(reason.clone()),
                None => TransportEvent::Online { address: identity.endpoint_id() },
            };
            tx.send(event).await.expect("event channel closed");

            let session = Arc::new(MockSession {
                sent: Mutex::new(Vec::new()),
                stops: AtomicUsize::new(0),
                fail_send: AtomicBool::new(false),
                events: tx,
            });
            self.sessions.lock().unwrap().push(session.clone());
            Ok((session, rx))
        }
    }

    #[async_trait]
    impl TransportSession for MockSession {
        async fn send(&self, stanza: &str) -> Result<(), SignalingError> {
            if self.fail_send.load(Ordering::SeqCst) {
                return Err(SignalingError::Send("broken pipe".into()));
            }
            self.sent.lock().unwrap().push(stanza.to_string());
            Ok(())
        }

        async fn stop(&self) -> Result<(), SignalingError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
