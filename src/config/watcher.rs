//! Hot reload of the gate configuration file.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GateConfig;

/// Watches the config file and publishes every valid new version.
///
/// Invalid edits are logged and dropped; the running config stays in force.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<GateConfig>,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GateConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                updates,
            },
            rx,
        )
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let updates = self.updates;

        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                match load_config(&path) {
                    Ok(config) => {
                        tracing::info!(path = %path.display(), "Gate config reloaded");
                        let _ = updates.send(config);
                    }
                    Err(e) => {
                        tracing::error!(
                            path = %path.display(),
                            error = %e,
                            "Rejected config change, keeping current configuration"
                        );
                    }
                }
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = ?e, "Config watch error"),
        };

        let mut watcher =
            RecommendedWatcher::new(handler, Config::default().with_poll_interval(Duration::from_secs(2)))?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}
