//! XMPP client transport.
//!
//! Speaks the client-to-server subset the connection-request side channel
//! needs: stream open, SASL PLAIN, stream restart, resource bind, initial
//! presence. After negotiation a reader task forwards inbound traffic as
//! events. Servers that refuse PLAIN on the clear stream reject the connect,
//! which the worker treats like any other fatal startup failure.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};

use super::session::SignalingIdentity;
use super::stanza::{escape_xml, new_request_id};
use super::transport::{SignalingTransport, TransportEvent, TransportSession};
use super::SignalingError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const SASL_NS: &str = "urn:ietf:params:xml:ns:xmpp-sasl";
const BIND_NS: &str = "urn:ietf:params:xml:ns:xmpp-bind";

// Negotiation replies are small; anything past this is a broken peer.
const MAX_NEGOTIATION_BUFFER: usize = 64 * 1024;

/// Client-to-server XMPP transport.
pub struct XmppTransport;

impl XmppTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for XmppTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalingTransport for XmppTransport {
    async fn connect(
        &self,
        identity: &SignalingIdentity,
    ) -> Result<(Arc<dyn TransportSession>, mpsc::Receiver<TransportEvent>), SignalingError>
    {
        tokio::time::timeout(CONNECT_TIMEOUT, negotiate(identity))
            .await
            .map_err(|_| SignalingError::Timeout(CONNECT_TIMEOUT))?
    }
}

struct XmppSession {
    writer: Mutex<OwnedWriteHalf>,
}

#[async_trait]
impl TransportSession for XmppSession {
    async fn send(&self, stanza: &str) -> Result<(), SignalingError> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(stanza.as_bytes())
            .await
            .map_err(|e| SignalingError::Send(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| SignalingError::Send(e.to_string()))
    }

    async fn stop(&self) -> Result<(), SignalingError> {
        let mut writer = self.writer.lock().await;
        // Best effort: the peer may already be gone.
        let _ = writer.write_all(b"</stream:stream>").await;
        let _ = writer.flush().await;
        writer
            .shutdown()
            .await
            .map_err(|e| SignalingError::Close(e.to_string()))
    }
}

async fn negotiate(
    identity: &SignalingIdentity,
) -> Result<(Arc<dyn TransportSession>, mpsc::Receiver<TransportEvent>), SignalingError> {
    let stream = TcpStream::connect((identity.host.as_str(), identity.port))
        .await
        .map_err(|e| SignalingError::Connect(format!("{}:{}: {}", identity.host, identity.port, e)))?;
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = write_half;

    open_stream(&mut writer, identity).await?;
    let features = read_until(&mut reader, &["</stream:features>"]).await?;
    if !features.contains(">PLAIN<") {
        return Err(SignalingError::Auth("server does not offer SASL PLAIN".into()));
    }

    let token = BASE64.encode(format!("\0{}\0{}", identity.username, identity.password));
    send(
        &mut writer,
        &format!("<auth xmlns='{SASL_NS}' mechanism='PLAIN'>{token}</auth>"),
    )
    .await?;
    let reply = read_until(&mut reader, &["<success", "<failure"]).await?;
    if reply.contains("<failure") {
        return Err(SignalingError::Auth("SASL authentication rejected".into()));
    }

    // Authentication restarts the stream.
    open_stream(&mut writer, identity).await?;
    read_until(&mut reader, &["</stream:features>"]).await?;

    let bind_id = new_request_id();
    send(
        &mut writer,
        &format!(
            "<iq id='{bind_id}' type='set'>\
             <bind xmlns='{BIND_NS}'><resource>{}</resource></bind>\
             </iq>",
            escape_xml(&identity.resource)
        ),
    )
    .await?;
    let reply = read_until(&mut reader, &["</iq>", "/>"]).await?;
    if reply.contains("type='error'") || reply.contains("type=\"error\"") {
        return Err(SignalingError::Connect("resource bind rejected".into()));
    }
    let address = extract_text(&reply, "jid").unwrap_or_else(|| identity.endpoint_id());

    send(&mut writer, "<presence/>").await?;

    let (events_tx, events_rx) = mpsc::channel(32);
    events_tx
        .send(TransportEvent::Online { address })
        .await
        .map_err(|_| SignalingError::Closed)?;
    tokio::spawn(read_loop(reader, events_tx));

    let session = Arc::new(XmppSession { writer: Mutex::new(writer) });
    Ok((session, events_rx))
}

async fn open_stream(
    writer: &mut OwnedWriteHalf,
    identity: &SignalingIdentity,
) -> Result<(), SignalingError> {
    let realm = escape_xml(identity.realm());
    let header = format!(
        "<?xml version='1.0'?>\
         <stream:stream from='{}@{}' to='{}' version='1.0' xml:lang='en' \
         xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams'>",
        escape_xml(&identity.username),
        realm,
        realm,
    );
    send(writer, &header).await
}

async fn send(writer: &mut OwnedWriteHalf, payload: &str) -> Result<(), SignalingError> {
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| SignalingError::Connect(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| SignalingError::Connect(e.to_string()))
}

/// Read until any marker appears, returning everything read so far.
async fn read_until(
    reader: &mut BufReader<OwnedReadHalf>,
    markers: &[&str],
) -> Result<String, SignalingError> {
    let mut buffer = String::new();
    let mut chunk = [0u8; 4096];
    loop {
        if markers.iter().any(|m| buffer.contains(m)) {
            return Ok(buffer);
        }
        if buffer.len() > MAX_NEGOTIATION_BUFFER {
            return Err(SignalingError::Connect("negotiation reply too large".into()));
        }
        let n = reader
            .read(&mut chunk)
            .await
            .map_err(|e| SignalingError::Connect(e.to_string()))?;
        if n == 0 {
            return Err(SignalingError::Closed);
        }
        buffer.push_str(&String::from_utf8_lossy(&chunk[..n]));
    }
}

/// First text content of `<element>...</element>` in `xml`, if any.
fn extract_text(xml: &str, element: &str) -> Option<String> {
    let open = format!("<{element}");
    let close = format!("</{element}>");
    let start = xml.find(&open)?;
    let content_start = xml[start..].find('>')? + start + 1;
    let content_end = xml[content_start..].find(&close)? + content_start;
    Some(xml[content_start..content_end].trim().to_string())
}

/// Forward inbound traffic as events until the stream ends.
async fn read_loop(mut reader: BufReader<OwnedReadHalf>, events: mpsc::Sender<TransportEvent>) {
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => {
                let _ = events.send(TransportEvent::Offline).await;
                break;
            }
            Ok(n) => {
                let text = String::from_utf8_lossy(&chunk[..n]).into_owned();
                let ended = text.contains("</stream:stream>");
                if events.send(TransportEvent::Stanza(text)).await.is_err() {
                    break;
                }
                if ended {
                    let _ = events.send(TransportEvent::Offline).await;
                    break;
                }
            }
            Err(e) => {
                let _ = events.send(TransportEvent::Error(e.to_string())).await;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt as _;
    use tokio::net::TcpListener;

    fn identity(port: u16) -> SignalingIdentity {
        SignalingIdentity {
            host: "127.0.0.1".to_string(),
            port,
            domain: "example.com".to_string(),
            username: "acs".to_string(),
            password: "x".to_string(),
            resource: "r1".to_string(),
        }
    }

    async fn expect(stream: &mut TcpStream, marker: &str) -> String {
        let mut buffer = String::new();
        let mut chunk = [0u8; 4096];
        while !buffer.contains(marker) {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed while waiting for {marker:?}");
            buffer.push_str(&String::from_utf8_lossy(&chunk[..n]));
        }
        buffer
    }

    /// Scripted server driving a full successful negotiation.
    async fn accepting_server(listener: TcpListener) -> TcpStream {
        let (mut stream, _) = listener.accept().await.unwrap();

        expect(&mut stream, "<stream:stream").await;
        stream
            .write_all(
                b"<stream:stream xmlns='jabber:client' version='1.0'>\
                  <stream:features>\
                  <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
                  <mechanism>PLAIN</mechanism></mechanisms>\
                  </stream:features>",
            )
            .await
            .unwrap();

        expect(&mut stream, "</auth>").await;
        stream
            .write_all(b"<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>")
            .await
            .unwrap();

        expect(&mut stream, "<stream:stream").await;
        stream
            .write_all(
                b"<stream:stream xmlns='jabber:client' version='1.0'>\
                  <stream:features><bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/>\
                  </stream:features>",
            )
            .await
            .unwrap();

        let bind = expect(&mut stream, "</iq>").await;
        assert!(bind.contains("<resource>r1</resource>"));
        stream
            .write_all(
                b"<iq type='result'><bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'>\
                  <jid>acs@example.com/r1</jid></bind></iq>",
            )
            .await
            .unwrap();

        expect(&mut stream, "<presence/>").await;
        stream
    }

    #[tokio::test]
    async fn negotiates_and_comes_online() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(accepting_server(listener));

        let transport = XmppTransport::new();
        let (session, mut events) = transport.connect(&identity(port)).await.unwrap();

        match events.recv().await.unwrap() {
            TransportEvent::Online { address } => assert_eq!(address, "acs@example.com/r1"),
            other => panic!("expected online, got {other:?}"),
        }

        let mut server_stream = server.await.unwrap();
        session.send("<iq id='x'/>").await.unwrap();
        let received = expect(&mut server_stream, "<iq id='x'/>").await;
        assert!(received.contains("<iq id='x'/>"));

        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn rejected_authentication_fails_the_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            expect(&mut stream, "<stream:stream").await;
            stream
                .write_all(
                    b"<stream:stream xmlns='jabber:client' version='1.0'>\
                      <stream:features>\
                      <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
                      <mechanism>PLAIN</mechanism></mechanisms>\
                      </stream:features>",
                )
                .await
                .unwrap();
            expect(&mut stream, "</auth>").await;
            stream
                .write_all(b"<failure xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><not-authorized/></failure>")
                .await
                .unwrap();
        });

        let transport = XmppTransport::new();
        let err = transport.connect(&identity(port)).await.unwrap_err();
        assert!(matches!(err, SignalingError::Auth(_)));
    }

    #[tokio::test]
    async fn missing_plain_mechanism_fails_the_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            expect(&mut stream, "<stream:stream").await;
            stream
                .write_all(
                    b"<stream:stream xmlns='jabber:client' version='1.0'>\
                      <stream:features>\
                      <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
                      <mechanism>SCRAM-SHA-1</mechanism></mechanisms>\
                      </stream:features>",
                )
                .await
                .unwrap();
        });

        let transport = XmppTransport::new();
        let err = transport.connect(&identity(port)).await.unwrap_err();
        assert!(matches!(err, SignalingError::Auth(_)));
    }
}
