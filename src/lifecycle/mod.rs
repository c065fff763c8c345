//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Init logging → Build App → Discover → Load plugins
//!
//! Running:
//!     Config watcher → App::reload → Load newly activated plugins
//!
//! Shutdown (startup.rs, shutdown.rs):
//!     Stop future resolves → Stop watcher → Unload plugins (best effort)
//!     Plugins stop their own background tasks through Shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then logging, then plugins by weight
//! - Signal handling belongs to the binary; the bootstrap only takes a future

pub mod shutdown;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Bootstrap, StartupError};
