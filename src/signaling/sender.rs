//! Connection-request dispatch.

use std::sync::Arc;

use super::session::SignalingSession;
use super::stanza::ConnectionRequestMessage;
use super::SignalingError;

/// Sends connection requests over the worker's signaling session.
#[derive(Clone)]
pub struct ConnectionRequestSender {
    session: Arc<SignalingSession>,
}

impl ConnectionRequestSender {
    pub fn new(session: Arc<SignalingSession>) -> Self {
        Self { session }
    }

    /// Ask the device at `target` to initiate a management session.
    ///
    /// A silent no-op unless a signaling session with an endpoint address
    /// exists: unconfigured signaling must never surface as an error to
    /// unrelated functionality. Send failures go back to the caller; retry
    /// policy belongs there.
    pub async fn send(
        &self,
        target: &str,
        username: &str,
        password: &str,
    ) -> Result<(), SignalingError> {
        let Some((eid, session)) = self.session.active_handle().await else {
            tracing::trace!(target = %target, "No signaling session, connection request skipped");
            return Ok(());
        };

        let message = ConnectionRequestMessage::new(target, &eid, username, password);
        tracing::debug!(id = %message.id, to = %target, "Sending connection request");
        session.send(&message.to_xml()).await
    }
}
