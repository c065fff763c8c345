//! Plugin lifecycle errors.

use thiserror::Error;

/// Boxed error returned by plugin implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the factory, the manager and typed accessors.
#[derive(Debug, Error)]
pub enum PluginError {
    /// No constructor (factory) or active instance (manager) for this name.
    #[error("unknown plugin `{0}`")]
    Unknown(String),

    /// A plugin's load returned an error. Fatal to the load sequence.
    #[error("plugin `{name}` failed to load: {source}")]
    Load {
        name: String,
        #[source]
        source: BoxError,
    },

    /// A plugin's unload returned an error. Logged, never fatal.
    #[error("plugin `{name}` failed to unload: {source}")]
    Unload {
        name: String,
        #[source]
        source: BoxError,
    },

    /// A typed accessor was handed a plugin of another concrete type.
    #[error("plugin `{name}` is not a {expected}")]
    KindMismatch {
        name: String,
        expected: &'static str,
    },
}

impl PluginError {
    /// Name of the plugin the error refers to.
    pub fn plugin(&self) -> &str {
        match self {
            PluginError::Unknown(name) => name,
            PluginError::Load { name, .. }
            | PluginError::Unload { name, .. }
            | PluginError::KindMismatch { name, .. } => name,
        }
    }
}

/// Result type for plugin lifecycle operations.
pub type PluginResult<T> = Result<T, PluginError>;
