//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so a minimal config works.

use serde::{Deserialize, Serialize};

use crate::signaling::SignalingIdentity;

/// Root configuration for the northbound-interface process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NbiConfig {
    /// Listener configuration (bind interface/port, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Worker-process settings (master only).
    pub cluster: ClusterConfig,

    /// Connection-request signaling settings.
    pub signaling: SignalingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (IP address).
    pub interface: String,

    /// Port to bind.
    pub port: u16,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            interface: "::".to_string(),
            port: 7557,
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds.
    pub request_secs: u64,

    /// How long the listener waits for in-flight connections on shutdown.
    pub drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            drain_secs: 30,
        }
    }
}

/// Worker-process settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Number of worker processes; 0 derives a count from the CPUs.
    pub worker_processes: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self { worker_processes: 0 }
    }
}

/// Connection-request signaling settings.
///
/// Signaling is optional: an empty host or a zero port disables it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// Signaling server host; empty disables signaling.
    pub host: String,

    /// Signaling server port; zero disables signaling.
    pub port: u16,

    /// Authentication realm; defaults to the host when empty.
    pub domain: String,

    pub username: String,

    pub password: String,

    /// Resource part of the endpoint address.
    pub resource: String,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 5222,
            domain: String::new(),
            username: String::new(),
            password: String::new(),
            resource: String::new(),
        }
    }
}

impl SignalingConfig {
    /// The immutable identity a session is started with.
    pub fn identity(&self) -> SignalingIdentity {
        SignalingIdentity {
            host: self.host.clone(),
            port: self.port,
            domain: self.domain.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            resource: self.resource.clone(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
