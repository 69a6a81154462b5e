//! Shared fixtures for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use acs_nbi::config::NbiConfig;
use acs_nbi::extensions::ExtensionManager;
use acs_nbi::http;
use acs_nbi::lifecycle::{Worker, WorkerOptions, WorkerProcessState};
use acs_nbi::signaling::{ConnectionRequestSender, SignalingSession, XmppTransport};
use acs_nbi::stores::{BackingStore, StoreError};

/// Programmable backing store.
pub struct FakeStore {
    name: String,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    hang_disconnect: bool,
    fail_connect: bool,
    slow_connect: bool,
}

impl FakeStore {
    fn with_flags(name: &str, hang: bool, fail: bool, slow: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            hang_disconnect: hang,
            fail_connect: fail,
            slow_connect: slow,
        })
    }

    pub fn new(name: &str) -> Arc<Self> {
        Self::with_flags(name, false, false, false)
    }

    /// Disconnect never resolves.
    pub fn hanging(name: &str) -> Arc<Self> {
        Self::with_flags(name, true, false, false)
    }

    /// Connect fails.
    pub fn failing(name: &str) -> Arc<Self> {
        Self::with_flags(name, false, true, false)
    }

    /// Connect takes a while.
    pub fn slow(name: &str) -> Arc<Self> {
        Self::with_flags(name, false, false, true)
    }
}

#[async_trait]
impl BackingStore for FakeStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<(), StoreError> {
        if self.slow_connect {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        if self.fail_connect {
            return Err(StoreError::new(&self.name, "connection refused"));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), StoreError> {
        if self.hang_disconnect {
            std::future::pending::<()>().await;
        }
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Config bound to a loopback ephemeral port, signaling unconfigured.
pub fn loopback_config() -> NbiConfig {
    let mut config = NbiConfig::default();
    config.listener.interface = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.signaling.host = String::new();
    config
}

pub fn worker_with_stores(stores: Vec<Arc<FakeStore>>) -> Arc<Worker> {
    let session = Arc::new(SignalingSession::new(Arc::new(XmppTransport::new())));
    let sender = ConnectionRequestSender::new(session.clone());
    Arc::new(Worker::new(WorkerOptions {
        config: loopback_config(),
        router: http::router(sender),
        stores: stores
            .into_iter()
            .map(|store| store as Arc<dyn BackingStore>)
            .collect(),
        extensions: Arc::new(ExtensionManager::new()),
        session,
    }))
}

/// Block until the worker reaches `target`.
pub async fn wait_for_state(worker: &Worker, target: WorkerProcessState) {
    let mut state = worker.state();
    loop {
        if *state.borrow() == target {
            return;
        }
        state.changed().await.expect("state channel closed");
    }
}
