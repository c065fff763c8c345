//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::source::Config;

/// Watches a config file (or directory) and forwards every valid reload.
///
/// Reloads that fail to parse or validate are logged and dropped; the host
/// keeps running on the configuration it already has.
pub struct ConfigWatcher {
    path: PathBuf,
    poll_interval: Duration,
}

impl ConfigWatcher {
    /// Watch `path` with the default poll interval.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            poll_interval: Duration::from_secs(2),
        }
    }

    /// Override the poll interval used by polling backends.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Start watching.
    ///
    /// The returned watcher must be kept alive for updates to keep flowing.
    pub fn spawn(self) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<Config>), notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_reload_event(&event) => {
                    tracing::info!(path = %path.display(), "Config change detected, reloading");
                    match load_config(&path) {
                        Ok(config) => {
                            let _ = tx.send(config);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Config reload rejected, keeping current configuration");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            NotifyConfig::default().with_poll_interval(self.poll_interval),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok((watcher, rx))
    }
}

/// Whether a filesystem event should trigger a reload.
///
/// Only content changes to `.toml` files count; editor swap files and
/// metadata-only touches are ignored.
pub fn is_reload_event(event: &Event) -> bool {
    let relevant_kind = event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove();
    let metadata_only = matches!(
        event.kind,
        notify::EventKind::Modify(notify::event::ModifyKind::Metadata(_))
    );

    relevant_kind
        && !metadata_only
        && event
            .paths
            .iter()
            .any(|p| p.extension().is_some_and(|ext| ext == "toml"))
}
