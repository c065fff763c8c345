//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Plugin manager and plugins produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (load/unload counters, durations, active set gauge)
//!
//! Consumers:
//!     → stdout (pretty, compact or JSON lines)
//!     → Prometheus scrape (when the metrics plugin is loaded)
//! ```
//!
//! # Design Decisions
//! - Every lifecycle transition is logged with the plugin name as a field
//! - Metrics are cheap (no-op until a recorder is installed)

pub mod logging;
pub mod metrics;
