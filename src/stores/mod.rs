//! Backing-store seam.
//!
//! The worker connects its backing stores (primary database, cache) at
//! startup and disconnects them during graceful exit, but the drivers
//! themselves belong to the management surface that queries them, not to
//! this process. Deployments register implementations of [`BackingStore`];
//! tests register fakes.

use async_trait::async_trait;
use thiserror::Error;

/// A backing-store operation failed.
#[derive(Debug, Error)]
#[error("backing store {store}: {reason}")]
pub struct StoreError {
    pub store: String,
    pub reason: String,
}

impl StoreError {
    pub fn new(store: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            reason: reason.into(),
        }
    }
}

/// Connect/disconnect contract for a backing store.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Store name for logs and errors.
    fn name(&self) -> &str;

    async fn connect(&self) -> Result<(), StoreError>;

    async fn disconnect(&self) -> Result<(), StoreError>;
}
