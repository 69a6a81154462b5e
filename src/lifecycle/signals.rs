//! OS signal handling.
//!
//! Two termination signals, both mapped to "request stop": the master
//! relays them to its workers, a worker applies them directly.

use tokio::signal::unix::{signal, SignalKind};

/// Resolve when SIGTERM or SIGINT arrives, naming the signal.
pub async fn termination() -> std::io::Result<&'static str> {
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    Ok(tokio::select! {
        _ = term.recv() => "SIGTERM",
        _ = int.recv() => "SIGINT",
    })
}
