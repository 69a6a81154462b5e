//! Configuration validation.
//!
//! Semantic checks only; serde handles the syntactic ones.

use std::net::IpAddr;

use thiserror::Error;

use crate::config::schema::NbiConfig;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("listener interface {0:?} is not a valid IP address")]
    Interface(String),

    #[error("TLS requires both cert_path and key_path")]
    TlsPair,

    #[error("timeouts must be greater than zero")]
    Timeouts,
}

pub fn validate(config: &NbiConfig) -> Result<(), ValidationError> {
    if config.listener.interface.parse::<IpAddr>().is_err() {
        return Err(ValidationError::Interface(config.listener.interface.clone()));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            return Err(ValidationError::TlsPair);
        }
    }
    if config.timeouts.request_secs == 0 || config.timeouts.drain_secs == 0 {
        return Err(ValidationError::Timeouts);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        validate(&NbiConfig::default()).unwrap();
    }

    #[test]
    fn bad_interface_is_rejected() {
        let mut config = NbiConfig::default();
        config.listener.interface = "not-an-ip".to_string();
        assert!(matches!(validate(&config), Err(ValidationError::Interface(_))));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = NbiConfig::default();
        config.timeouts.request_secs = 0;
        assert!(matches!(validate(&config), Err(ValidationError::Timeouts)));
    }
}
