//! Connection-request wire payload.
//!
//! The connection-request extension carries the device's configured
//! connection-request credentials inside an information query addressed from
//! the server's own endpoint to the device's endpoint. Requests are
//! fire-and-forget: the id identifies an outstanding request on the wire but
//! is never correlated with a reply.

use rand::RngCore;
use std::fmt::Write as _;

/// Namespace of the CWMP connection-request payload.
pub const CONNECTION_REQUEST_NS: &str = "urn:broadband-forum-org:cwmp:xmppConnReq-1-0";

/// A single connection-request message, built fresh per request.
#[derive(Debug, Clone)]
pub struct ConnectionRequestMessage {
    /// Per-request id, 32 lowercase hex characters.
    pub id: String,
    /// Endpoint address of the target device.
    pub to: String,
    /// Endpoint address of this server.
    pub from: String,
    /// Device's configured connection-request username.
    pub username: String,
    /// Device's configured connection-request password.
    pub password: String,
}

impl ConnectionRequestMessage {
    pub fn new(to: &str, from: &str, username: &str, password: &str) -> Self {
        Self {
            id: new_request_id(),
            to: to.to_string(),
            from: from.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Serialize to the wire form.
    pub fn to_xml(&self) -> String {
        format!(
            "<iq id=\"{}\" to=\"{}\" from=\"{}\" type=\"get\">\
             <connectionRequest xmlns=\"{}\">\
             <username>{}</username>\
             <password>{}</password>\
             </connectionRequest>\
             </iq>",
            escape_xml(&self.id),
            escape_xml(&self.to),
            escape_xml(&self.from),
            CONNECTION_REQUEST_NS,
            escape_xml(&self.username),
            escape_xml(&self.password),
        )
    }
}

/// Generate a fresh request id: 16 random bytes, hex-encoded.
///
/// Uniqueness is probabilistic; ids are not checked against prior ones.
pub fn new_request_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut id = String::with_capacity(32);
    for byte in bytes {
        let _ = write!(id, "{byte:02x}");
    }
    id
}

/// Escape text for use in XML attribute values and character data.
pub(crate) fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
