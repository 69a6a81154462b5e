//! Master process: spawn and supervise workers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::sync::mpsc;

use crate::cluster::WORKER_ENV;
use crate::config::NbiConfig;
use crate::lifecycle::signals;

/// A worker dying this soon after spawn counts toward the crash-loop guard.
const QUICK_EXIT_WINDOW: Duration = Duration::from_secs(10);
const MAX_QUICK_EXITS: u32 = 3;

/// Run the master until all workers have stopped. Returns the exit code.
pub async fn run(config: &NbiConfig, config_path: Option<&Path>) -> i32 {
    let count = resolve_worker_count(config.cluster.worker_processes);
    tracing::info!(
        pid = std::process::id(),
        workers = count,
        version = env!("CARGO_PKG_VERSION"),
        "Master starting"
    );

    let (exit_tx, mut exit_rx) = mpsc::unbounded_channel();
    let mut cluster = Cluster {
        exit_tx,
        pids: HashMap::new(),
        spawned_at: HashMap::new(),
        config_path: config_path.map(Path::to_path_buf),
    };

    for slot in 0..count {
        if let Err(e) = cluster.spawn_worker(slot) {
            tracing::error!(slot, error = %e, "Failed to spawn worker");
            return 1;
        }
    }

    let mut stopping = false;
    let mut quick_exits = 0u32;
    loop {
        tokio::select! {
            signal = signals::termination() => {
                match signal {
                    Ok(name) => tracing::info!(
                        signal = name,
                        pid = std::process::id(),
                        "Received termination signal, stopping workers"
                    ),
                    Err(e) => {
                        tracing::error!(error = %e, "Signal handler failed");
                        return 1;
                    }
                }
                stopping = true;
                cluster.relay_stop();
                if cluster.pids.is_empty() {
                    break;
                }
            }
            Some((slot, code)) = exit_rx.recv() => {
                let quickly = cluster.reap(slot);
                if stopping {
                    if cluster.pids.is_empty() {
                        break;
                    }
                    continue;
                }

                tracing::warn!(slot, code = ?code, "Worker exited unexpectedly, respawning");
                quick_exits = if quickly { quick_exits + 1 } else { 0 };
                if quick_exits >= MAX_QUICK_EXITS {
                    tracing::error!("Workers are crash-looping, giving up");
                    cluster.relay_stop();
                    return 1;
                }
                if let Err(e) = cluster.spawn_worker(slot) {
                    tracing::error!(slot, error = %e, "Failed to respawn worker");
                    return 1;
                }
            }
        }
    }

    tracing::info!("All workers stopped");
    0
}

struct Cluster {
    exit_tx: mpsc::UnboundedSender<(usize, Option<i32>)>,
    pids: HashMap<usize, u32>,
    spawned_at: HashMap<usize, Instant>,
    config_path: Option<PathBuf>,
}

impl Cluster {
    fn spawn_worker(&mut self, slot: usize) -> std::io::Result<()> {
        let exe = std::env::current_exe()?;
        let mut command = Command::new(exe);
        command
            .env(WORKER_ENV, "1")
            .stdin(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = &self.config_path {
            command.arg("--config").arg(path);
        }

        let mut child = command.spawn()?;
        let pid = child.id().unwrap_or_default();
        // The piped stdin is the worker's control channel; when the master
        // goes away, EOF tells the worker to stop.
        let control = child.stdin.take();

        self.pids.insert(slot, pid);
        self.spawned_at.insert(slot, Instant::now());

        let exit_tx = self.exit_tx.clone();
        tokio::spawn(async move {
            let _control = control;
            let code = child.wait().await.ok().and_then(|status| status.code());
            let _ = exit_tx.send((slot, code));
        });

        tracing::info!(slot, pid, "Worker spawned");
        Ok(())
    }

    /// Relay the termination signal to every live worker.
    fn relay_stop(&self) {
        for (&slot, &pid) in &self.pids {
            tracing::debug!(slot, pid, "Relaying stop to worker");
            let _ = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        }
    }

    /// Forget a worker; true when it died inside the quick-exit window.
    fn reap(&mut self, slot: usize) -> bool {
        self.pids.remove(&slot);
        self.spawned_at
            .remove(&slot)
            .map(|at| at.elapsed() < QUICK_EXIT_WINDOW)
            .unwrap_or(false)
    }
}

/// Configured count, or a CPU-derived default clamped to [2, 4].
pub fn resolve_worker_count(configured: usize) -> usize {
    if configured > 0 {
        return configured;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(2, 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_count_wins() {
        assert_eq!(resolve_worker_count(7), 7);
    }

    #[test]
    fn auto_count_is_clamped() {
        let count = resolve_worker_count(0);
        assert!((2..=4).contains(&count));
    }
}
