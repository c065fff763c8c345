//! Lifecycle metrics.
//!
//! # Metrics
//! - `plughost_plugin_loads_total` (counter): load attempts by plugin, result
//! - `plughost_plugin_load_duration_seconds` (histogram): time spent in load
//! - `plughost_plugin_unloads_total` (counter): unload attempts by plugin, result
//! - `plughost_active_plugins` (gauge): size of the active plugin set
//!
//! Recording is a no-op until a recorder is installed (the built-in
//! `metrics` plugin installs a Prometheus exporter).

use std::time::Instant;

use metrics::{counter, gauge, histogram};

fn result_label(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

/// Record one load attempt.
pub fn record_plugin_load(plugin: &str, ok: bool, started: Instant) {
    counter!(
        "plughost_plugin_loads_total",
        "plugin" => plugin.to_string(),
        "result" => result_label(ok)
    )
    .increment(1);
    histogram!("plughost_plugin_load_duration_seconds", "plugin" => plugin.to_string())
        .record(started.elapsed().as_secs_f64());
}

/// Record one unload attempt.
pub fn record_plugin_unload(plugin: &str, ok: bool) {
    counter!(
        "plughost_plugin_unloads_total",
        "plugin" => plugin.to_string(),
        "result" => result_label(ok)
    )
    .increment(1);
}

/// Record the size of the active plugin set.
pub fn record_active_plugins(count: usize) {
    gauge!("plughost_active_plugins").set(count as f64);
}
