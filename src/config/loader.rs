//! Configuration loading from disk and the environment.
//!
//! A TOML file provides the base; environment variables overlay it so a
//! containerized deployment can run without any file at all.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::{NbiConfig, TlsConfig};
use crate::config::validation::{validate, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    Env { var: String, value: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Load and validate configuration: file (optional), then environment.
pub fn load(path: Option<&Path>) -> Result<NbiConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                source: e,
            })?
        }
        None => NbiConfig::default(),
    };

    apply_env(&mut config, |var| std::env::var(var).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// The lookup is injected so tests stay independent of process-global state.
pub fn apply_env(
    config: &mut NbiConfig,
    get: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(v) = get("ACS_NBI_INTERFACE") {
        config.listener.interface = v;
    }
    if let Some(v) = get("ACS_NBI_PORT") {
        config.listener.port = parse("ACS_NBI_PORT", &v)?;
    }
    if let Some(v) = get("ACS_NBI_WORKER_PROCESSES") {
        config.cluster.worker_processes = parse("ACS_NBI_WORKER_PROCESSES", &v)?;
    }

    let cert = get("ACS_NBI_SSL_CERT");
    let key = get("ACS_NBI_SSL_KEY");
    if cert.is_some() || key.is_some() {
        let mut tls = config.listener.tls.clone().unwrap_or_default();
        if let Some(cert) = cert {
            tls.cert_path = cert;
        }
        if let Some(key) = key {
            tls.key_path = key;
        }
        config.listener.tls = Some(tls);
    }

    if let Some(v) = get("ACS_XMPP_HOST") {
        config.signaling.host = v;
    }
    if let Some(v) = get("ACS_XMPP_PORT") {
        config.signaling.port = parse("ACS_XMPP_PORT", &v)?;
    }
    if let Some(v) = get("ACS_XMPP_DOMAIN") {
        config.signaling.domain = v;
    }
    if let Some(v) = get("ACS_XMPP_USERNAME") {
        config.signaling.username = v;
    }
    if let Some(v) = get("ACS_XMPP_PASSWORD") {
        config.signaling.password = v;
    }
    if let Some(v) = get("ACS_XMPP_RESOURCE") {
        config.signaling.resource = v;
    }

    if let Some(v) = get("ACS_LOG_LEVEL") {
        config.observability.log_level = v;
    }
    Ok(())
}

fn parse<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
    })
}
