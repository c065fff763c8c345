//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging before anything else logs
//! - Build the host, discover and load plugins
//! - Optionally follow configuration changes
//! - Unload every plugin once the caller's stop future resolves
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and returned, never a panic
//! - A failed load unloads whatever did load before returning the error

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::app::control_plane::{ControlPlane, LocalControlPlane, LocalControlPlaneConfig};
use crate::app::App;
use crate::config::{load_config, Config, ConfigError, ConfigWatcher, HostConfig};
use crate::observability::logging::{init_logging, LoggingError};
use crate::plugin::{Plugin, PluginError, PluginFactory};

/// Section that enables the in-process control plane.
pub const CONTROL_PLANE_SECTION: &str = "control_plane";

/// Error type for the bootstrap path.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("config watcher error: {0}")]
    Watch(#[from] notify::Error),
}

/// Builder that turns a factory and a config path into a running host.
pub struct Bootstrap {
    factory: PluginFactory,
    plugins: Vec<Arc<dyn Plugin>>,
    control_plane: Option<Arc<dyn ControlPlane>>,
    watch: bool,
    logging: bool,
}

impl Bootstrap {
    pub fn new(factory: PluginFactory) -> Self {
        Self {
            factory,
            plugins: Vec::new(),
            control_plane: None,
            watch: false,
            logging: true,
        }
    }

    /// Add a manually supplied plugin; it is active whatever the config says.
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Use this control plane instead of one built from configuration.
    pub fn with_control_plane(mut self, control_plane: Arc<dyn ControlPlane>) -> Self {
        self.control_plane = Some(control_plane);
        self
    }

    /// Reload the configuration when the file changes.
    pub fn watch_config(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Leave the global subscriber alone (tests, embedding hosts).
    pub fn without_logging(mut self) -> Self {
        self.logging = false;
        self
    }

    /// Build the host without loading anything.
    ///
    /// A `[control_plane]` section installs a [`LocalControlPlane`] unless
    /// one was supplied explicitly.
    pub fn build(self, config: Config) -> Result<App, StartupError> {
        let control_plane = match self.control_plane {
            Some(cp) => Some(cp),
            None => {
                let section = config.value(CONTROL_PLANE_SECTION);
                if section.is_present() {
                    let settings: LocalControlPlaneConfig = section.scan()?;
                    Some(Arc::new(LocalControlPlane::new(settings)) as Arc<dyn ControlPlane>)
                } else {
                    None
                }
            }
        };

        let app = App::new(config, Arc::new(self.factory), self.plugins)?;
        Ok(match control_plane {
            Some(cp) => app.with_control_plane(cp),
            None => app,
        })
    }

    /// Run the host from the configuration at `path` until `until` resolves.
    pub async fn run<F>(self, path: &Path, until: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()>,
    {
        let config = load_config(path)?;
        let settings: HostConfig = config.scan()?;
        if self.logging {
            init_logging(&settings.logging)?;
        }

        let watch = self.watch.then_some(path);
        self.run_with(config, watch, until).await
    }

    /// Run the host from an already loaded configuration, following `watch`
    /// for changes when given.
    ///
    /// The watcher starts before any plugin loads, so a watch failure leaves
    /// nothing to clean up.
    pub async fn run_with<F>(self, config: Config, watch: Option<&Path>, until: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()>,
    {
        let watcher = watch.map(|path| ConfigWatcher::new(path).spawn()).transpose()?;

        let app = Arc::new(self.build(config)?);
        tracing::info!(
            name = %app.name(),
            version = %app.version(),
            instance = %app.host_info().instance_id,
            "Starting"
        );

        if let Err(e) = app.load_plugins().await {
            tracing::error!(error = %e, "Startup aborted, unloading plugins");
            app.unload_plugins().await;
            return Err(e.into());
        }

        let reloader = watcher.map(|(watcher, mut updates)| {
            let app = Arc::clone(&app);
            let task = tokio::spawn(async move {
                while let Some(config) = updates.recv().await {
                    if let Err(e) = app.reload(config).await {
                        tracing::error!(error = %e, "Failed to load plugins after reload");
                    }
                }
            });
            (watcher, task)
        });

        tracing::info!("Ready");
        until.await;
        tracing::info!("Shutting down");

        if let Some((watcher, task)) = reloader {
            drop(watcher);
            task.abort();
        }

        let errors = app.unload_plugins().await;
        for e in &errors {
            tracing::warn!(plugin = %e.plugin(), error = %e, "Unload failed");
        }
        tracing::info!("Shutdown complete");
        Ok(())
    }
}
