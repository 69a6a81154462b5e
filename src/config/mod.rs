//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overlay, ACS_* variables)
//!     → validation.rs (semantic checks)
//!     → NbiConfig (validated, immutable for the process lifetime)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; workers are respawned by the master
//!   to pick up changes
//! - All fields have defaults so the environment alone is enough
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load, ConfigError};
pub use schema::{
    ClusterConfig, ListenerConfig, NbiConfig, ObservabilityConfig, SignalingConfig,
    TimeoutConfig, TlsConfig,
};
pub use validation::validate;
