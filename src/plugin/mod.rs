//! Plugin lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     PluginFactory (name → constructor, section → names)
//!     → discovery.rs (sections present in Config → construct instances)
//!     → manager.rs (active set, sorted by descending weight)
//!     → Plugin::load(config subtree) one at a time, fail-fast
//!
//! Shutdown:
//!     manager.rs → Plugin::unload in insertion order, best-effort
//! ```
//!
//! # Design Decisions
//! - No global registry: the factory is an explicit value handed to the host
//! - Sequential load/unload: later plugins may depend on global state set up
//!   by earlier ones (e.g. a metrics recorder installed before a transport)
//! - Typed access goes through checked downcasts, never unchecked casts

pub mod context;
pub mod contract;
pub mod discovery;
pub mod error;
pub mod factory;
pub mod manager;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{HostInfo, LoadContext};
pub use contract::{downcast, downcast_arc, Plugin};
pub use discovery::resolve_configs;
pub use error::{BoxError, PluginError, PluginResult};
pub use factory::{Constructor, PluginFactory, RegistrationTable};
pub use manager::{PluginManager, PluginState};
