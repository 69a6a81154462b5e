//! Worker-side supervision channel.
//!
//! The master holds each worker's stdin open as a control channel. A `stop`
//! line or EOF (the master is gone) maps to a stop request. Disconnect-style
//! read errors are the expected shutdown race between parent and child, not
//! application errors, and are ignored.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::StopReason;
use crate::lifecycle::worker::Worker;

/// Watch stdin for supervisor commands.
pub fn watch_supervisor(worker: Arc<Worker>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim() == "stop" => {
                    worker.request_stop(StopReason::Supervisor);
                    break;
                }
                Ok(Some(_)) => continue,
                Ok(None) => {
                    tracing::info!("Supervisor control channel closed, stopping");
                    worker.request_stop(StopReason::Supervisor);
                    break;
                }
                Err(e) if is_benign_disconnect(&e) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "Control channel read failed");
                    break;
                }
            }
        }
    })
}

/// Disconnect errors raised when the supervising parent already closed its
/// end of the channel.
fn is_benign_disconnect(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::UnexpectedEof
    )
}
