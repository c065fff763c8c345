//! Active plugin set and load/unload orchestration.
//!
//! # Responsibilities
//! - Own every constructed plugin instance, keyed by its name
//! - Load in descending weight order, stopping at the first failure
//! - Unload in insertion order, attempting every plugin
//! - Track per-plugin state so nothing loads or unloads twice
//!
//! # Design Decisions
//! - Load is fail-fast: a half-initialized subsystem set must not serve
//! - Unload is best-effort: one failure never leaks the others' resources
//! - Weight ties keep insertion order (stable sort)
//! - Entries are never evicted; unload only changes their state

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ConfigValue;
use crate::observability::metrics;
use crate::plugin::context::{HostInfo, LoadContext};
use crate::plugin::contract::Plugin;
use crate::plugin::error::{PluginError, PluginResult};

/// Lifecycle state of one active plugin, as seen by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    /// Constructed, `load` not yet called.
    Constructed,
    /// `load` succeeded.
    Loaded,
    /// `load` returned an error.
    Failed,
    /// `unload` was called (whatever its outcome).
    Unloaded,
}

struct Entry {
    name: String,
    plugin: Arc<dyn Plugin>,
    state: PluginState,
}

/// Owner of the active plugin set.
#[derive(Default)]
pub struct PluginManager {
    /// Insertion order.
    entries: Vec<Entry>,
    /// Name → position in `entries`.
    index: HashMap<String, usize>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with manually supplied plugins, in the given order.
    pub fn with_plugins<I>(plugins: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Plugin>>,
    {
        let mut manager = Self::new();
        for plugin in plugins {
            manager.insert(plugin);
        }
        manager
    }

    /// Add a plugin to the active set.
    ///
    /// Returns `false` (and drops `plugin`) when its name is already active.
    pub fn insert(&mut self, plugin: Arc<dyn Plugin>) -> bool {
        let name = plugin.name().to_string();
        if self.index.contains_key(&name) {
            tracing::warn!(plugin = %name, "Plugin already active, ignoring duplicate");
            return false;
        }

        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(Entry {
            name,
            plugin,
            state: PluginState::Constructed,
        });
        metrics::record_active_plugins(self.entries.len());
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Look up an active plugin.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.index
            .get(name)
            .map(|&i| Arc::clone(&self.entries[i].plugin))
    }

    /// Current lifecycle state of an active plugin.
    pub fn state(&self, name: &str) -> Option<PluginState> {
        self.index.get(name).map(|&i| self.entries[i].state)
    }

    /// Active names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Names and weights in the order `load_all` would visit them.
    pub fn load_order(&self) -> Vec<(&str, i32)> {
        self.sorted((0..self.entries.len()).collect())
            .into_iter()
            .map(|i| (self.entries[i].name.as_str(), self.entries[i].plugin.weight()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load every active plugin, highest weight first.
    ///
    /// Stops at the first failure and returns it. Plugins already loaded stay
    /// loaded; the caller decides whether to unload them.
    pub fn load_all(&mut self, configs: &HashMap<String, ConfigValue>, host: &HostInfo) -> PluginResult<()> {
        let all = (0..self.entries.len()).collect();
        self.load_sequence(all, configs, host)
    }

    /// Load only `names`, highest weight first.
    ///
    /// Every name must be active; an unknown name fails before anything
    /// loads.
    pub fn load_subset<S: AsRef<str>>(
        &mut self,
        names: &[S],
        configs: &HashMap<String, ConfigValue>,
        host: &HostInfo,
    ) -> PluginResult<()> {
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let i = *self
                .index
                .get(name)
                .ok_or_else(|| PluginError::Unknown(name.to_string()))?;
            if !selected.contains(&i) {
                selected.push(i);
            }
        }
        self.load_sequence(selected, configs, host)
    }

    /// Unload every active plugin in insertion order.
    ///
    /// Never stops early. Returns every error encountered.
    pub fn unload_all(&mut self) -> Vec<PluginError> {
        let all: Vec<usize> = (0..self.entries.len()).collect();
        let mut errors = Vec::new();
        for i in all {
            if let Err(e) = self.unload_entry(i) {
                errors.push(e);
            }
        }
        errors
    }

    /// Unload only `names`, in the given order. Best-effort like `unload_all`.
    pub fn unload_subset<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<PluginError> {
        let mut errors = Vec::new();
        for name in names {
            let name = name.as_ref();
            let Some(&i) = self.index.get(name) else {
                tracing::warn!(plugin = %name, "Cannot unload plugin that is not active");
                errors.push(PluginError::Unknown(name.to_string()));
                continue;
            };
            if let Err(e) = self.unload_entry(i) {
                errors.push(e);
            }
        }
        errors
    }

    /// Stable sort of entry positions by descending weight.
    fn sorted(&self, mut positions: Vec<usize>) -> Vec<usize> {
        positions.sort_by_key(|&i| Reverse(self.entries[i].plugin.weight()));
        positions
    }

    fn load_sequence(
        &mut self,
        positions: Vec<usize>,
        configs: &HashMap<String, ConfigValue>,
        host: &HostInfo,
    ) -> PluginResult<()> {
        for i in self.sorted(positions) {
            let entry = &mut self.entries[i];
            if entry.state != PluginState::Constructed {
                tracing::debug!(plugin = %entry.name, state = ?entry.state, "Skipping plugin, not in constructed state");
                continue;
            }

            let absent;
            let config = match configs.get(&entry.name) {
                Some(config) => config,
                None => {
                    absent = ConfigValue::absent(entry.name.clone());
                    &absent
                }
            };

            tracing::info!(plugin = %entry.name, weight = entry.plugin.weight(), "Loading plugin");
            let started = Instant::now();
            match entry.plugin.load(&LoadContext::new(config, host)) {
                Ok(()) => {
                    entry.state = PluginState::Loaded;
                    metrics::record_plugin_load(&entry.name, true, started);
                    tracing::info!(
                        plugin = %entry.name,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Plugin loaded"
                    );
                }
                Err(source) => {
                    entry.state = PluginState::Failed;
                    metrics::record_plugin_load(&entry.name, false, started);
                    tracing::error!(plugin = %entry.name, error = %source, "Plugin failed to load, aborting load sequence");
                    return Err(PluginError::Load {
                        name: entry.name.clone(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    fn unload_entry(&mut self, i: usize) -> PluginResult<()> {
        let entry = &mut self.entries[i];
        if entry.state == PluginState::Unloaded {
            tracing::debug!(plugin = %entry.name, "Plugin already unloaded");
            return Ok(());
        }

        tracing::info!(plugin = %entry.name, "Unloading plugin");
        let result = entry.plugin.unload();
        entry.state = PluginState::Unloaded;
        metrics::record_plugin_unload(&entry.name, result.is_ok());

        result.map_err(|source| {
            tracing::warn!(plugin = %entry.name, error = %source, "Plugin failed to unload");
            PluginError::Unload {
                name: entry.name.clone(),
                source,
            }
        })
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|e| (&e.name, e.state)))
            .finish()
    }
}
