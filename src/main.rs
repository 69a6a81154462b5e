//! Entry point: role dispatch between master and worker.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use acs_nbi::cluster;
use acs_nbi::config::{self, NbiConfig};
use acs_nbi::extensions::ExtensionManager;
use acs_nbi::http;
use acs_nbi::lifecycle::{signals, StopReason, Worker, WorkerOptions};
use acs_nbi::signaling::{ConnectionRequestSender, SignalingSession, XmppTransport};

#[derive(Parser, Debug)]
#[command(name = "acs-nbi", version, about = "CWMP ACS northbound-interface server")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = match config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    let code = if cluster::is_worker_process() {
        run_worker(config).await
    } else {
        cluster::master::run(&config, args.config.as_deref()).await
    };
    std::process::exit(code);
}

fn init_tracing(config: &NbiConfig) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_worker(config: NbiConfig) -> i32 {
    tracing::info!(
        pid = std::process::id(),
        version = env!("CARGO_PKG_VERSION"),
        "Worker starting"
    );

    let session = Arc::new(SignalingSession::new(Arc::new(XmppTransport::new())));
    let sender = ConnectionRequestSender::new(session.clone());
    let worker = Arc::new(Worker::new(WorkerOptions {
        router: http::router(sender),
        stores: Vec::new(),
        extensions: Arc::new(ExtensionManager::new()),
        session,
        config,
    }));

    {
        let worker = worker.clone();
        tokio::spawn(async move {
            match signals::termination().await {
                Ok(signal) => {
                    tracing::info!(signal, pid = std::process::id(), "Received termination signal");
                    worker.request_stop(StopReason::Signal);
                }
                Err(e) => tracing::warn!(error = %e, "Failed to install signal handlers"),
            }
        });
    }
    let _supervisor = cluster::control::watch_supervisor(worker.clone());

    match worker.run().await {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            tracing::error!(error = %e, "Worker startup failed");
            1
        }
    }
}
