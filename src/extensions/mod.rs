//! Helper-process registry.
//!
//! Extension scripts run as child processes spawned on demand. The registry
//! tracks them so both exit paths can terminate whatever is still running:
//! graceful exit kills them concurrently with the store disconnects,
//! forceful exit kills them before the process dies.

use futures_util::future::join_all;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

pub struct ExtensionManager {
    children: Mutex<Vec<ExtensionProcess>>,
}

struct ExtensionProcess {
    name: String,
    child: Child,
}

impl ExtensionManager {
    pub fn new() -> Self {
        Self {
            children: Mutex::new(Vec::new()),
        }
    }

    /// Spawn and register a helper process.
    pub async fn spawn(
        &self,
        name: &str,
        program: &str,
        args: &[String],
    ) -> Result<(), std::io::Error> {
        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .spawn()?;
        tracing::debug!(extension = %name, pid = ?child.id(), "Extension process started");
        self.children.lock().await.push(ExtensionProcess {
            name: name.to_string(),
            child,
        });
        Ok(())
    }

    /// Number of registered helper processes.
    pub async fn count(&self) -> usize {
        self.children.lock().await.len()
    }

    /// Terminate every registered helper, best effort, and reap them.
    ///
    /// Safe to call repeatedly; a second call observes an empty registry.
    pub async fn kill_all(&self) {
        let drained: Vec<ExtensionProcess> = {
            let mut children = self.children.lock().await;
            children.drain(..).collect()
        };
        if drained.is_empty() {
            return;
        }
        tracing::info!(count = drained.len(), "Terminating extension processes");

        join_all(drained.into_iter().map(|mut proc| async move {
            if let Err(e) = proc.child.start_kill() {
                tracing::warn!(extension = %proc.name, error = %e, "Kill failed");
            }
            let _ = proc.child.wait().await;
        }))
        .await;
    }
}

impl Default for ExtensionManager {
    fn default() -> Self {
        Self::new()
    }
}
