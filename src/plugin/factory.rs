//! Plugin factory and registration table.
//!
//! # Responsibilities
//! - Map plugin names to constructors
//! - Map configuration sections to the plugin names they activate
//!
//! # Design Decisions
//! - Built once at startup, then shared read-only behind an `Arc`
//! - Re-registering a name replaces the constructor (last writer wins)
//! - Holds no instances; every `create` returns a fresh, unloaded plugin

use std::collections::HashMap;

use crate::plugin::contract::Plugin;
use crate::plugin::error::{PluginError, PluginResult};

/// Zero-argument constructor producing a fresh, unloaded plugin.
pub type Constructor = Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Section key → plugin names activated when that section is present.
///
/// Iterates in the order sections were first bound.
#[derive(Debug, Clone, Default)]
pub struct RegistrationTable {
    entries: Vec<(String, Vec<String>)>,
}

impl RegistrationTable {
    /// Bind `name` to `section`. Binding the same pair twice is a no-op.
    pub fn bind(&mut self, section: impl Into<String>, name: impl Into<String>) {
        let section = section.into();
        let name = name.into();

        match self.entries.iter_mut().find(|(key, _)| *key == section) {
            Some((_, names)) => {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            None => self.entries.push((section, vec![name])),
        }
    }

    /// Declare a section with no plugins yet. Discovery skips it.
    pub fn declare(&mut self, section: impl Into<String>) {
        let section = section.into();
        if !self.entries.iter().any(|(key, _)| *key == section) {
            self.entries.push((section, Vec::new()));
        }
    }

    /// Plugin names bound to `section`.
    pub fn get(&self, section: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(key, _)| key == section)
            .map(|(_, names)| names.as_slice())
    }

    /// All sections with their names, in binding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, names)| (key.as_str(), names.as_slice()))
    }

    /// Sections that activate `name`, in binding order.
    pub fn sections_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(_, names)| names.iter().any(|n| n == name))
            .map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Name → constructor registry plus the registration table.
#[derive(Default)]
pub struct PluginFactory {
    creators: HashMap<String, Constructor>,
    table: RegistrationTable,
}

impl PluginFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the constructor for `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, creator: F)
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.creators.insert(name.clone(), Box::new(creator)).is_some() {
            tracing::debug!(plugin = %name, "Plugin constructor replaced");
        }
    }

    /// Bind an already registered (or later registered) name to a section.
    pub fn bind_section(&mut self, section: impl Into<String>, name: impl Into<String>) {
        self.table.bind(section, name);
    }

    /// Register a constructor and bind it to a section in one step.
    pub fn register_for_section<F>(&mut self, section: impl Into<String>, name: impl Into<String>, creator: F)
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        let name = name.into();
        self.table.bind(section, name.clone());
        self.register(name, creator);
    }

    /// Whether a constructor exists for `name`.
    pub fn exists(&self, name: &str) -> bool {
        self.creators.contains_key(name)
    }

    /// Construct a fresh, unloaded instance.
    pub fn create(&self, name: &str) -> PluginResult<Box<dyn Plugin>> {
        let creator = self
            .creators
            .get(name)
            .ok_or_else(|| PluginError::Unknown(name.to_string()))?;
        Ok(creator())
    }

    /// The section → names table consulted by discovery.
    pub fn registration_table(&self) -> &RegistrationTable {
        &self.table
    }

    /// Mutable access to the table, for hosts that declare sections up front.
    pub fn registration_table_mut(&mut self) -> &mut RegistrationTable {
        &mut self.table
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.creators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for PluginFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginFactory")
            .field("plugins", &self.names())
            .field("table", &self.table)
            .finish()
    }
}
