//! Worker lifecycle control.
//!
//! # Data Flow
//! ```text
//! run():
//!     Initializing: connect stores + bind listener + start signaling,
//!                   concurrently; any failure is a fatal startup error
//!     Running:      wait for a stop trigger, an uncaught fault, or the
//!                   listener dying
//!     Draining:     accepted requests finish, marked Connection: close
//!     Exiting:      graceful teardown raced against a 5 s watchdog
//! ```
//!
//! # Design Decisions
//! - No state is re-entered; only stop triggers and faults leave Running
//! - Graceful teardown order: signaling session, listener, then stores and
//!   helper processes concurrently
//! - The watchdog is a global backstop, not a per-operation timeout

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use futures_util::future::try_join_all;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};

use crate::config::NbiConfig;
use crate::extensions::ExtensionManager;
use crate::http::{NbiServer, ServerError};
use crate::lifecycle::shutdown::{Shutdown, StopReason};
use crate::signaling::{SignalingError, SignalingSession};
use crate::stores::{BackingStore, StoreError};

/// Global deadline for graceful exit before escalating.
pub const SHUTDOWN_WATCHDOG: Duration = Duration::from_secs(5);

/// Lifecycle state of a worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerProcessState {
    Initializing,
    Running,
    Draining,
    ExitingGracefully,
    ExitingForcefully,
}

/// How the worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    Graceful,
    Forceful,
}

impl WorkerOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            WorkerOutcome::Graceful => 0,
            WorkerOutcome::Forceful => 1,
        }
    }
}

/// Fatal startup failure; the process is supervised and will be respawned.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("listener startup failed: {0}")]
    Listener(#[from] ServerError),

    #[error("backing store startup failed: {0}")]
    Store(#[from] StoreError),

    #[error("signaling startup failed: {0}")]
    Signaling(#[from] SignalingError),
}

#[derive(Debug, Error)]
enum ShutdownError {
    #[error("listener shutdown failed: {0}")]
    Listener(#[source] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Handle for reporting uncaught runtime faults to the worker.
#[derive(Clone)]
pub struct FaultReporter {
    tx: mpsc::UnboundedSender<String>,
}

impl FaultReporter {
    pub fn report(&self, fault: impl Into<String>) {
        let _ = self.tx.send(fault.into());
    }
}

/// Everything a worker needs to run.
pub struct WorkerOptions {
    pub config: NbiConfig,
    /// Management surface served by the listener.
    pub router: Router,
    pub stores: Vec<Arc<dyn BackingStore>>,
    pub extensions: Arc<ExtensionManager>,
    /// The process-wide signaling session, owned by this controller.
    pub session: Arc<SignalingSession>,
}

/// Per-process lifecycle controller.
pub struct Worker {
    config: NbiConfig,
    router: Router,
    stores: Vec<Arc<dyn BackingStore>>,
    extensions: Arc<ExtensionManager>,
    session: Arc<SignalingSession>,
    draining: Arc<AtomicBool>,
    stopping: AtomicBool,
    stop: Shutdown,
    state: watch::Sender<WorkerProcessState>,
    faults_tx: mpsc::UnboundedSender<String>,
    faults_rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl Worker {
    pub fn new(options: WorkerOptions) -> Self {
        let (state, _) = watch::channel(WorkerProcessState::Initializing);
        let (faults_tx, faults_rx) = mpsc::unbounded_channel();
        Self {
            config: options.config,
            router: options.router,
            stores: options.stores,
            extensions: options.extensions,
            session: options.session,
            draining: Arc::new(AtomicBool::new(false)),
            stopping: AtomicBool::new(false),
            stop: Shutdown::new(),
            state,
            faults_tx,
            faults_rx: Mutex::new(faults_rx),
        }
    }

    /// Observe lifecycle state transitions.
    pub fn state(&self) -> watch::Receiver<WorkerProcessState> {
        self.state.subscribe()
    }

    /// Handle for components to report uncaught faults.
    pub fn fault_reporter(&self) -> FaultReporter {
        FaultReporter {
            tx: self.faults_tx.clone(),
        }
    }

    /// Request a stop. Idempotent: the first call wins, later calls are
    /// observed and dropped.
    ///
    /// The draining flag is raised immediately so already-accepted requests
    /// complete while their connections are marked for closure; the run loop
    /// proceeds to graceful exit once any pending startup settles.
    pub fn request_stop(&self, reason: StopReason) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            tracing::debug!(reason = %reason, "Stop already in progress");
            return;
        }
        tracing::info!(reason = %reason, "Stop requested, draining");
        self.draining.store(true, Ordering::SeqCst);
        self.stop.trigger(reason);
    }

    /// Start the worker and drive it to completion.
    ///
    /// Startup connects the backing stores, binds the listener, and starts
    /// the signaling session, all concurrently; any failure is fatal.
    pub async fn run(&self) -> Result<WorkerOutcome, StartupError> {
        let mut stop_rx = self.stop.subscribe();
        self.set_state(WorkerProcessState::Initializing);

        let identity = self.config.signaling.identity();
        let stores_up = async {
            try_join_all(self.stores.iter().map(|s| s.connect()))
                .await
                .map(|_| ())
                .map_err(StartupError::Store)
        };
        let listener_up = async {
            NbiServer::start(
                &self.config.listener,
                &self.config.timeouts,
                self.router.clone(),
                self.draining.clone(),
            )
            .await
            .map_err(StartupError::Listener)
        };
        let signaling_up = async {
            self.session
                .start(&identity)
                .await
                .map_err(StartupError::Signaling)
        };
        let ((), mut server, ()) = tokio::try_join!(stores_up, listener_up, signaling_up)?;

        // A stop that arrived mid-startup skips Running entirely.
        if !self.stopping.load(Ordering::SeqCst) {
            self.set_state(WorkerProcessState::Running);
            tracing::info!(address = %server.local_addr(), "Worker running");

            let mut faults = self.faults_rx.lock().await;
            tokio::select! {
                _ = stop_rx.recv() => {}
                Some(fault) = faults.recv() => {
                    tracing::error!(fault = %fault, "Uncaught fault, shutting down");
                    self.request_stop(StopReason::Fault);
                }
                err = server.died() => {
                    tracing::error!(error = %err, "Listener terminated unexpectedly");
                    self.request_stop(StopReason::Fault);
                }
            }
        }

        Ok(self.shutdown(server).await)
    }

    /// Drain and tear down, escalating to forceful exit on overrun or error.
    async fn shutdown(&self, server: NbiServer) -> WorkerOutcome {
        self.draining.store(true, Ordering::SeqCst);
        self.set_state(WorkerProcessState::Draining);

        let drain = Duration::from_secs(self.config.timeouts.drain_secs);
        // The watchdog is armed the instant graceful exit begins. Whichever
        // branch loses the race is dropped, so a completed graceful exit
        // never waits out the watchdog.
        tokio::select! {
            result = self.graceful_exit(server, drain) => match result {
                Ok(()) => {
                    self.set_state(WorkerProcessState::ExitingGracefully);
                    tracing::info!("Worker exited gracefully");
                    WorkerOutcome::Graceful
                }
                Err(e) => {
                    tracing::error!(error = %e, "Graceful exit failed, escalating");
                    self.forceful_exit().await
                }
            },
            _ = tokio::time::sleep(SHUTDOWN_WATCHDOG) => {
                tracing::error!(
                    watchdog_secs = SHUTDOWN_WATCHDOG.as_secs(),
                    "Graceful exit overran the watchdog, escalating"
                );
                self.forceful_exit().await
            }
        }
    }

    async fn graceful_exit(&self, server: NbiServer, drain: Duration) -> Result<(), ShutdownError> {
        // Session first, so an in-flight send cannot race listener teardown.
        self.session.stop().await;
        server.shutdown(drain).await.map_err(ShutdownError::Listener)?;

        let disconnects = try_join_all(self.stores.iter().map(|s| s.disconnect()));
        let (stores_result, ()) = tokio::join!(disconnects, self.extensions.kill_all());
        stores_result?;
        Ok(())
    }

    async fn forceful_exit(&self) -> WorkerOutcome {
        self.extensions.kill_all().await;
        self.set_state(WorkerProcessState::ExitingForcefully);
        WorkerOutcome::Forceful
    }

    fn set_state(&self, state: WorkerProcessState) {
        self.state.send_replace(state);
    }
}
