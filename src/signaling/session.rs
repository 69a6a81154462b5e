//! Signaling session lifecycle.
//!
//! A worker owns at most one signaling session. The session is an optional
//! NAT-traversal aid for devices with no reachable inbound path; most
//! deployments leave it unconfigured, so a missing configuration is a
//! successful no-op everywhere in this module.

use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::transport::{SignalingTransport, TransportEvent, TransportSession};
use super::SignalingError;

/// Immutable endpoint identity on the signaling network.
#[derive(Debug, Clone, Default)]
pub struct SignalingIdentity {
    pub host: String,
    pub port: u16,
    pub domain: String,
    pub username: String,
    pub password: String,
    pub resource: String,
}

impl SignalingIdentity {
    /// Signaling is configured when both a host and a port are present.
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && self.port != 0
    }

    /// Authentication realm: the domain, falling back to the host.
    pub fn realm(&self) -> &str {
        if self.domain.is_empty() {
            &self.host
        } else {
            &self.domain
        }
    }

    /// Own endpoint address, `username@realm/resource`.
    pub fn endpoint_id(&self) -> String {
        format!("{}@{}/{}", self.username, self.realm(), self.resource)
    }
}

/// Connection state of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Online,
    Offline,
    Failed,
}

struct ActiveSession {
    eid: String,
    session: Arc<dyn TransportSession>,
    observer: JoinHandle<()>,
}

impl ActiveSession {
    async fn close(self) {
        // Stop observing before closing so teardown events from the
        // transport cannot race the state we publish afterwards.
        self.observer.abort();
        if let Err(e) = self.session.stop().await {
            tracing::warn!(error = %e, "Transport close failed");
        }
    }
}

/// Handle to the worker's signaling session.
///
/// `start` and `stop` are safe under overlapping invocation: the active
/// session lives in an `Option` behind a lock, so a racing second stop
/// observes already-cleared state and does nothing.
pub struct SignalingSession {
    transport: Arc<dyn SignalingTransport>,
    active: Mutex<Option<ActiveSession>>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl SignalingSession {
    pub fn new(transport: Arc<dyn SignalingTransport>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            active: Mutex::new(None),
            state: Arc::new(state),
        }
    }

    /// Observe connection state transitions.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Own endpoint address while a session exists.
    pub async fn endpoint_id(&self) -> Option<String> {
        self.active.lock().await.as_ref().map(|a| a.eid.clone())
    }

    /// Open a session for `identity` and wait until it is online.
    ///
    /// A no-op success when signaling is unconfigured. If a session already
    /// exists it is closed before the replacement is opened; a new session
    /// instance is always created, never reused.
    pub async fn start(&self, identity: &SignalingIdentity) -> Result<(), SignalingError> {
        if !identity.is_configured() {
            tracing::debug!("Signaling not configured, skipping");
            return Ok(());
        }

        let mut active = self.active.lock().await;
        if let Some(old) = active.take() {
            tracing::warn!("Replacing live signaling session");
            old.close().await;
        }

        self.state.send_replace(ConnectionState::Connecting);
        let (session, mut events) = match self.transport.connect(identity).await {
            Ok(connected) => connected,
            Err(e) => {
                self.state.send_replace(ConnectionState::Failed);
                return Err(e);
            }
        };

        // Single-shot resolution: only the first of {online, error} settles
        // the start; anything else before that is ignored.
        let address = loop {
            match events.recv().await {
                Some(TransportEvent::Online { address }) => break address,
                Some(TransportEvent::Error(reason)) => {
                    self.state.send_replace(ConnectionState::Failed);
                    let _ = session.stop().await;
                    return Err(SignalingError::Connect(reason));
                }
                Some(_) => continue,
                None => {
                    self.state.send_replace(ConnectionState::Failed);
                    return Err(SignalingError::Closed);
                }
            }
        };

        let eid = identity.endpoint_id();
        self.state.send_replace(ConnectionState::Online);
        tracing::info!(address = %address, eid = %eid, "Signaling session online");

        let observer = tokio::spawn(observe(events, self.state.clone()));
        *active = Some(ActiveSession { eid, session, observer });
        Ok(())
    }

    /// Close the session and clear the stored endpoint address.
    ///
    /// A no-op when no session exists.
    pub async fn stop(&self) {
        let taken = self.active.lock().await.take();
        if let Some(active) = taken {
            active.close().await;
            self.state.send_replace(ConnectionState::Disconnected);
            tracing::debug!("Signaling session stopped");
        }
    }

    /// Current endpoint address and transport handle, if a session exists.
    pub(crate) async fn active_handle(&self) -> Option<(String, Arc<dyn TransportSession>)> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|a| (a.eid.clone(), a.session.clone()))
    }
}

/// Passive observation of a live session.
///
/// Inbound stanzas are logged and dropped; reply handling is not part of
/// this process.
async fn observe(
    mut events: tokio::sync::mpsc::Receiver<TransportEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Stanza(stanza) => {
                tracing::trace!(stanza = %stanza, "Inbound stanza observed");
            }
            TransportEvent::Offline => {
                if *state.borrow() == ConnectionState::Online {
                    state.send_replace(ConnectionState::Offline);
                    tracing::warn!("Signaling session went offline");
                }
            }
            TransportEvent::Error(reason) => {
                tracing::warn!(reason = %reason, "Signaling transport error");
            }
            TransportEvent::Online { .. } => {}
        }
    }
}
