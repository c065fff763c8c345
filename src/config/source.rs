//! Configuration tree and section lookup.
//!
//! # Responsibilities
//! - Hold the merged TOML document for the whole process
//! - Answer "is there a value at section K" with an opaque handle
//! - Decode a handle into a plugin-specific typed structure
//!
//! # Design Decisions
//! - Section keys are dotted paths walked through nested tables
//! - An absent value decodes as an empty table, so `#[serde(default)]`
//!   structs come back with their defaults

use serde::de::DeserializeOwned;

use crate::config::loader::ConfigError;

/// The process-wide configuration document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    root: toml::Table,
}

impl Config {
    /// Wrap an already parsed table.
    pub fn from_table(root: toml::Table) -> Self {
        Self { root }
    }

    /// Parse a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let root: toml::Table = toml::from_str(content)?;
        Ok(Self { root })
    }

    /// Look up the value bound at a dotted section key.
    pub fn value(&self, key: &str) -> ConfigValue {
        let mut segments = key.split('.').filter(|s| !s.is_empty());
        let inner = segments.next().and_then(|first| {
            segments.try_fold(self.root.get(first)?, |node, segment| {
                node.as_table()?.get(segment)
            })
        });

        ConfigValue {
            key: key.to_string(),
            inner: inner.cloned(),
        }
    }

    /// Decode the whole document into `T`.
    pub fn scan<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        toml::Value::Table(self.root.clone())
            .try_into()
            .map_err(|source| ConfigError::Decode {
                key: "<root>".to_string(),
                source,
            })
    }

    /// Top-level table.
    pub fn root(&self) -> &toml::Table {
        &self.root
    }
}

/// Opaque handle to the value at one section key.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValue {
    key: String,
    inner: Option<toml::Value>,
}

impl ConfigValue {
    /// A handle for a key that has no value.
    pub fn absent(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            inner: None,
        }
    }

    /// The section key this handle was resolved from.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the configuration binds anything at this key.
    pub fn is_present(&self) -> bool {
        self.inner.is_some()
    }

    /// Raw TOML value, if present.
    pub fn raw(&self) -> Option<&toml::Value> {
        self.inner.as_ref()
    }

    /// Decode into a typed structure.
    pub fn scan<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        let value = self
            .inner
            .clone()
            .unwrap_or_else(|| toml::Value::Table(toml::Table::new()));

        value.try_into().map_err(|source| ConfigError::Decode {
            key: self.key.clone(),
            source,
        })
    }
}
