//! Configuration-driven plugin host.
//!
//! Optional subsystems register a constructor with a [`PluginFactory`] and
//! bind it to a configuration section. When the section is present the host
//! constructs the plugin, loads every active plugin in descending weight
//! order and unloads them all on shutdown.

pub mod app;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod plugin;
pub mod plugins;

pub use app::App;
pub use config::Config;
pub use lifecycle::{Bootstrap, Shutdown, StartupError};
pub use plugin::{HostInfo, LoadContext, Plugin, PluginError, PluginFactory, PluginManager};
