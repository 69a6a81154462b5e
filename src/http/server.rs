//! NBI listener setup.
//!
//! # Responsibilities
//! - Bind the configured interface/port, with TLS when a key/cert pair is set
//! - Wrap the externally supplied router with drain, timeout, and trace layers
//! - Graceful shutdown: stop accepting, wait out in-flight connections up to
//!   the listener's own drain timeout
//!
//! The management surface itself is thin per-request dispatch owned by the
//! excluded REST component; this module only hosts whatever router it hands
//! over, plus a minimal built-in surface so the binary is runnable.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use serde::Deserialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{ListenerConfig, TimeoutConfig};
use crate::http::drain;
use crate::signaling::ConnectionRequestSender;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid listen interface {interface:?}")]
    Interface { interface: String },

    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("failed to load TLS key/cert: {0}")]
    Tls(#[source] std::io::Error),
}

/// A running NBI listener.
pub struct NbiServer {
    handle: axum_server::Handle,
    task: Option<JoinHandle<std::io::Result<()>>>,
    local_addr: SocketAddr,
}

impl NbiServer {
    /// Bind and serve `router`, resolving once the listener is accepting.
    pub async fn start(
        listener: &ListenerConfig,
        timeouts: &TimeoutConfig,
        router: Router,
        draining: Arc<AtomicBool>,
    ) -> Result<NbiServer, ServerError> {
        let ip: IpAddr = listener.interface.parse().map_err(|_| ServerError::Interface {
            interface: listener.interface.clone(),
        })?;
        let addr = SocketAddr::new(ip, listener.port);

        let app = router
            .layer(axum::middleware::from_fn_with_state(draining, drain::mark_draining))
            .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs)))
            .layer(TraceLayer::new_for_http());

        let handle = axum_server::Handle::new();
        let task = match &listener.tls {
            Some(tls) => {
                let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                    .await
                    .map_err(ServerError::Tls)?;
                let server = axum_server::bind_rustls(addr, rustls).handle(handle.clone());
                tokio::spawn(server.serve(app.into_make_service()))
            }
            None => {
                let server = axum_server::bind(addr).handle(handle.clone());
                tokio::spawn(server.serve(app.into_make_service()))
            }
        };

        match handle.listening().await {
            Some(local_addr) => {
                tracing::info!(
                    address = %local_addr,
                    tls = listener.tls.is_some(),
                    "NBI listener started"
                );
                Ok(NbiServer {
                    handle,
                    task: Some(task),
                    local_addr,
                })
            }
            None => {
                let err = match task.await {
                    Ok(Err(e)) => e,
                    Ok(Ok(())) => std::io::Error::other("listener exited before binding"),
                    Err(join) => std::io::Error::other(join.to_string()),
                };
                Err(ServerError::Bind(err))
            }
        }
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Resolve if the serve task dies; pending forever otherwise.
    ///
    /// Cancel-safe: the task handle is only cleared once it has completed.
    pub async fn died(&mut self) -> std::io::Error {
        let result = match self.task.as_mut() {
            Some(task) => task.await,
            None => return std::future::pending().await,
        };
        self.task = None;
        match result {
            Ok(Ok(())) => std::io::Error::other("listener exited unexpectedly"),
            Ok(Err(e)) => e,
            Err(join) => std::io::Error::other(join.to_string()),
        }
    }

    /// Stop accepting and wait for in-flight connections, up to `drain`.
    pub async fn shutdown(mut self, drain: Duration) -> std::io::Result<()> {
        self.handle.graceful_shutdown(Some(drain));
        match self.task.take() {
            Some(task) => match task.await {
                Ok(result) => result,
                Err(join) => Err(std::io::Error::other(join.to_string())),
            },
            None => Ok(()),
        }
    }
}

/// Built-in management surface.
///
/// The operator-facing REST dispatch plugs in here; by itself the process
/// exposes liveness and the connection-request trigger.
pub fn router(sender: ConnectionRequestSender) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/connection_requests", post(connection_request))
        .with_state(ApiState { sender })
}

#[derive(Clone)]
struct ApiState {
    sender: ConnectionRequestSender,
}

async fn ping() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
struct ConnectionRequestBody {
    /// Endpoint address of the device to contact.
    device: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn connection_request(
    State(state): State<ApiState>,
    Json(body): Json<ConnectionRequestBody>,
) -> impl IntoResponse {
    match state
        .sender
        .send(&body.device, &body.username, &body.password)
        .await
    {
        // Fire-and-forget: accepted means handed to the transport (or
        // skipped because signaling is not configured).
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            tracing::warn!(device = %body.device, error = %e, "Connection request failed");
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}
