//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file or directory (TOML)
//!     → loader.rs (read, deep-merge, parse)
//!     → schema.rs (typed bootstrap sections: application, logging)
//!     → validation.rs (semantic checks)
//!     → source.rs Config (opaque tree, section lookup by dotted key)
//!     → shared via ArcSwap by the host application
//!
//! On change:
//!     watcher.rs detects a .toml write
//!     → loader.rs loads + validates
//!     → host swaps the Config and activates newly present sections
//! ```
//!
//! # Design Decisions
//! - The core only asks "is section K present" and "decode K into T"
//! - Plugin sections stay untyped until the owning plugin scans them
//! - All bootstrap fields have defaults to allow minimal configs

pub mod loader;
pub mod schema;
pub mod source;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{ApplicationConfig, HostConfig, LogFormat, LoggingConfig};
pub use source::{Config, ConfigValue};
pub use watcher::ConfigWatcher;
