//! Host application.
//!
//! # Responsibilities
//! - Own the active plugin set and the current configuration
//! - Build the `HostInfo` every plugin sees during load
//! - Drive discovery, load, hot reload and unload
//! - Resolve other services for plugins (`subscribe`)
//!
//! # Data Flow
//! ```text
//! Config (ArcSwap) ──► discover ──► resolve_configs ──► PluginManager::load_*
//!        ▲
//!        └── reload(new config): swap, discover again, load only new names
//! ```
//!
//! # Design Decisions
//! - The manager sits behind an async mutex: reload and shutdown may race
//! - Configuration reads never block, they load a snapshot from `ArcSwap`

pub mod control_plane;
pub mod subscribe;

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;

use crate::config::{Config, ConfigError, HostConfig};
use crate::plugin::{
    resolve_configs, HostInfo, Plugin, PluginError, PluginFactory, PluginManager, PluginResult,
    PluginState,
};

use self::control_plane::ControlPlane;

/// A running plugin host.
pub struct App {
    host: HostInfo,
    config: ArcSwap<Config>,
    factory: Arc<PluginFactory>,
    manager: Mutex<PluginManager>,
    span: tracing::Span,
}

impl App {
    /// Build a host from configuration, a factory and manually supplied
    /// plugins. Nothing is loaded yet.
    pub fn new<I>(config: Config, factory: Arc<PluginFactory>, plugins: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = Arc<dyn Plugin>>,
    {
        let settings: HostConfig = config.scan()?;
        let host_name = settings
            .application
            .host
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "localhost".to_string());
        let host = HostInfo::new(settings.application.name, settings.application.version, host_name);

        let span = tracing::info_span!(
            "app",
            name = %host.name,
            version = %host.version,
            instance = %host.instance_id
        );

        Ok(Self {
            host,
            config: ArcSwap::from_pointee(config),
            factory,
            manager: Mutex::new(PluginManager::with_plugins(plugins)),
            span,
        })
    }

    /// Expose a control plane to plugins loaded from now on.
    pub fn with_control_plane(mut self, control_plane: Arc<dyn ControlPlane>) -> Self {
        self.host = self.host.with_control_plane(control_plane);
        self
    }

    pub fn host_info(&self) -> &HostInfo {
        &self.host
    }

    pub fn name(&self) -> &str {
        &self.host.name
    }

    pub fn version(&self) -> &str {
        &self.host.version
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<Config> {
        self.config.load_full()
    }

    pub fn factory(&self) -> &Arc<PluginFactory> {
        &self.factory
    }

    /// Activate plugins for the current configuration and load every active
    /// plugin, highest weight first.
    ///
    /// Returns the names activated by discovery.
    pub async fn load_plugins(&self) -> PluginResult<Vec<String>> {
        let config = self.config.load_full();
        let mut manager = self.manager.lock().await;
        let _enter = self.span.enter();

        let activated = manager.discover(&config, &self.factory);
        let names: Vec<String> = manager.names().into_iter().map(str::to_string).collect();
        let configs = resolve_configs(&names, &config, self.factory.registration_table());

        tracing::info!(active = names.len(), discovered = activated.len(), "Loading plugins");
        manager.load_all(&configs, &self.host)?;
        Ok(activated)
    }

    /// Swap in a new configuration and load plugins whose sections newly
    /// appeared. Plugins already active are not reconfigured.
    ///
    /// If one of the new plugins fails to load, every newly activated plugin
    /// is unloaded before the error is returned; plugins active before the
    /// reload are untouched.
    pub async fn reload(&self, config: Config) -> PluginResult<Vec<String>> {
        let config = Arc::new(config);
        self.config.store(Arc::clone(&config));

        let mut manager = self.manager.lock().await;
        let _enter = self.span.enter();

        let activated = manager.discover(&config, &self.factory);
        if activated.is_empty() {
            tracing::debug!("Configuration reloaded, no new plugins");
            return Ok(activated);
        }

        let configs = resolve_configs(&activated, &config, self.factory.registration_table());
        tracing::info!(plugins = ?activated, "Configuration reloaded, loading new plugins");
        if let Err(e) = manager.load_subset(&activated, &configs, &self.host) {
            tracing::error!(error = %e, "Reload failed, unloading newly activated plugins");
            for failure in manager.unload_subset(&activated) {
                tracing::warn!(plugin = %failure.plugin(), error = %failure, "Unload failed");
            }
            return Err(e);
        }
        Ok(activated)
    }

    /// Unload every active plugin. Returns every unload error.
    pub async fn unload_plugins(&self) -> Vec<PluginError> {
        let mut manager = self.manager.lock().await;
        let _enter = self.span.enter();

        let errors = manager.unload_all();
        if errors.is_empty() {
            tracing::info!("All plugins unloaded");
        } else {
            tracing::warn!(failures = errors.len(), "Plugins unloaded with errors");
        }
        errors
    }

    /// Look up an active plugin by name.
    pub async fn plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.manager.lock().await.get(name)
    }

    pub async fn plugin_state(&self, name: &str) -> Option<PluginState> {
        self.manager.lock().await.state(name)
    }

    /// Active names with weights, in load order.
    pub async fn load_order(&self) -> Vec<(String, i32)> {
        self.manager
            .lock()
            .await
            .load_order()
            .into_iter()
            .map(|(name, weight)| (name.to_string(), weight))
            .collect()
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("host", &self.host)
            .field("factory", &self.factory)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::testing::{Journal, Probe};

    fn factory(journal: &Journal) -> Arc<PluginFactory> {
        let mut factory = PluginFactory::new();
        let j = journal.clone();
        factory.register_for_section("server", "http", move || Box::new(Probe::new("http", 500).with_journal(&j)));
        let j = journal.clone();
        factory.register_for_section("cache", "redis", move || Box::new(Probe::new("redis", 100).with_journal(&j)));
        Arc::new(factory)
    }

    #[tokio::test]
    async fn test_identity_from_config() {
        let config = Config::parse("[application]\nname = \"orders\"\nversion = \"2.1.0\"\nhost = \"node-7\"").unwrap();
        let app = App::new(config, Arc::new(PluginFactory::new()), Vec::new()).unwrap();

        assert_eq!(app.name(), "orders");
        assert_eq!(app.version(), "2.1.0");
        assert_eq!(app.host_info().host, "node-7");
        assert!(app.host_info().control_plane().is_none());
    }

    #[tokio::test]
    async fn test_load_plugins_discovers_and_loads() {
        let journal = Journal::default();
        let config = Config::parse("[server]\n[cache]").unwrap();
        let manual: Arc<dyn Plugin> = Arc::new(Probe::new("tracer", 700).with_journal(&journal));
        let app = App::new(config, factory(&journal), [manual]).unwrap();

        let activated = app.load_plugins().await.unwrap();

        assert_eq!(activated, vec!["http", "redis"]);
        assert_eq!(journal.events(), vec!["load:tracer", "load:http", "load:redis"]);
        assert_eq!(app.plugin_state("redis").await, Some(PluginState::Loaded));
    }

    #[tokio::test]
    async fn test_reload_loads_only_new_sections() {
        let journal = Journal::default();
        let app = App::new(Config::parse("[server]").unwrap(), factory(&journal), Vec::new()).unwrap();
        app.load_plugins().await.unwrap();

        let activated = app.reload(Config::parse("[server]\n[cache]").unwrap()).await.unwrap();

        assert_eq!(activated, vec!["redis"]);
        assert_eq!(journal.events(), vec!["load:http", "load:redis"]);
        assert!(app.config().value("cache").is_present());

        let again = app.reload(Config::parse("[server]\n[cache]").unwrap()).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_failed_reload_unloads_new_plugins() {
        let journal = Journal::default();
        let mut factory = PluginFactory::new();
        let j = journal.clone();
        factory.register_for_section("server", "http", move || Box::new(Probe::new("http", 500).with_journal(&j)));
        let j = journal.clone();
        factory.register_for_section("cache", "redis", move || Box::new(Probe::new("redis", 300).with_journal(&j)));
        let j = journal.clone();
        factory.register_for_section("cache", "memcached", move || {
            Box::new(Probe::new("memcached", 100).with_journal(&j).failing_load())
        });
        let app = App::new(Config::parse("[server]").unwrap(), Arc::new(factory), Vec::new()).unwrap();
        app.load_plugins().await.unwrap();

        let err = app.reload(Config::parse("[server]\n[cache]").unwrap()).await.unwrap_err();

        assert_eq!(err.plugin(), "memcached");
        assert_eq!(
            journal.events(),
            vec!["load:http", "load:redis", "load:memcached", "unload:redis", "unload:memcached"]
        );
        assert_eq!(app.plugin_state("http").await, Some(PluginState::Loaded));
        assert_eq!(app.plugin_state("redis").await, Some(PluginState::Unloaded));
        assert_eq!(app.plugin_state("memcached").await, Some(PluginState::Unloaded));
    }

    #[tokio::test]
    async fn test_unload_plugins() {
        let journal = Journal::default();
        let app = App::new(Config::parse("[server]\n[cache]").unwrap(), factory(&journal), Vec::new()).unwrap();
        app.load_plugins().await.unwrap();

        assert!(app.unload_plugins().await.is_empty());
        assert_eq!(app.plugin_state("http").await, Some(PluginState::Unloaded));
        assert!(app.plugin("missing").await.is_none());
    }
}
