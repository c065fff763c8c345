//! Configuration-driven plugin activation.
//!
//! # Data Flow
//! ```text
//! RegistrationTable (section → names)
//!     → section present in Config?          no  → skip
//!     → name list empty?                    yes → skip
//!     → name already active / unregistered? yes → skip
//!     → PluginFactory::create → PluginManager::insert
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{Config, ConfigValue};
use crate::plugin::contract::Plugin;
use crate::plugin::factory::{PluginFactory, RegistrationTable};
use crate::plugin::manager::PluginManager;

impl PluginManager {
    /// Activate every registered plugin whose section is present in `config`.
    ///
    /// Purely additive: already active plugins, including manually supplied
    /// ones, are left alone. Returns the names that became active, in
    /// activation order.
    pub fn discover(&mut self, config: &Config, factory: &PluginFactory) -> Vec<String> {
        let mut activated = Vec::new();

        for (section, names) in factory.registration_table().iter() {
            if !config.value(section).is_present() {
                tracing::trace!(section, "Section absent, skipping");
                continue;
            }
            if names.is_empty() {
                continue;
            }

            for name in names {
                if self.contains(name) || !factory.exists(name) {
                    continue;
                }

                let plugin: Arc<dyn Plugin> = match factory.create(name) {
                    Ok(plugin) => Arc::from(plugin),
                    Err(e) => {
                        tracing::warn!(plugin = %name, error = %e, "Plugin construction failed, skipping");
                        continue;
                    }
                };

                let actual = plugin.name().to_string();
                if actual != *name {
                    tracing::warn!(registered = %name, reported = %actual, "Plugin reports a different name than registered");
                }
                if self.insert(plugin) {
                    tracing::debug!(plugin = %actual, section, "Plugin activated");
                    activated.push(actual);
                }
            }
        }

        activated
    }
}

/// Map each plugin name to its configuration subtree.
///
/// Uses the first section bound to the name that is present in `config`,
/// then a top-level section named after the plugin, else an absent value.
pub fn resolve_configs<S: AsRef<str>>(
    names: &[S],
    config: &Config,
    table: &RegistrationTable,
) -> HashMap<String, ConfigValue> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            let value = table
                .sections_for(name)
                .map(|section| config.value(section))
                .find(ConfigValue::is_present)
                .unwrap_or_else(|| config.value(name));
            (name.to_string(), value)
        })
        .collect()
}
