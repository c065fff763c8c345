//! Prometheus exporter plugin.
//!
//! Loads before every other built-in so the recorder is in place when they
//! start emitting. The recorder is installed once per process and outlives
//! the plugin; the scrape endpoint is owned by the plugin and stops on unload.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Duration;

use axum::{extract::State, routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;

use crate::lifecycle::shutdown::Shutdown;
use crate::plugin::{downcast, BoxError, LoadContext, Plugin, PluginResult};

pub const NAME: &str = "metrics";
pub const SECTION: &str = "metrics";
pub const WEIGHT: i32 = 700;

const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

static RECORDER: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// `[metrics]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Scrape endpoint address.
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:9000".to_string(),
        }
    }
}

/// Handle to the process-wide Prometheus recorder, installing it on first use.
pub fn recorder_handle() -> Result<PrometheusHandle, BoxError> {
    let mut installed = RECORDER
        .lock()
        .map_err(|_| "metrics recorder lock poisoned")?;
    if let Some(handle) = installed.as_ref() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    *installed = Some(handle.clone());
    Ok(handle)
}

struct Exporter {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    thread: JoinHandle<()>,
}

#[derive(Default)]
pub struct MetricsPlugin {
    exporter: Mutex<Option<Exporter>>,
}

impl MetricsPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_installed(&self) -> bool {
        self.local_addr().is_some()
    }

    /// Scrape endpoint address while loaded.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.exporter
            .lock()
            .ok()
            .and_then(|exporter| exporter.as_ref().map(|e| e.local_addr))
    }
}

fn poisoned() -> BoxError {
    "metrics plugin state lock poisoned".into()
}

async fn scrape(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

impl Plugin for MetricsPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn weight(&self) -> i32 {
        WEIGHT
    }

    fn load(&self, ctx: &LoadContext<'_>) -> Result<(), BoxError> {
        let config: MetricsConfig = ctx.config().scan()?;
        let addr: SocketAddr = config
            .addr
            .parse()
            .map_err(|e| format!("invalid metrics address `{}`: {e}", config.addr))?;

        let mut exporter = self.exporter.lock().map_err(|_| poisoned())?;
        if exporter.is_some() {
            return Err("metrics exporter already running".into());
        }

        let std_listener = std::net::TcpListener::bind(addr)
            .map_err(|e| format!("failed to bind metrics endpoint {addr}: {e}"))?;
        std_listener.set_nonblocking(true)?;
        let local_addr = std_listener.local_addr()?;

        let handle = recorder_handle()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let listener = {
            let _guard = runtime.enter();
            tokio::net::TcpListener::from_std(std_listener)?
        };

        let router = Router::new()
            .route("/metrics", get(scrape))
            .with_state(handle.clone());

        let shutdown = Shutdown::new();
        let signal = shutdown.clone();
        let thread = std::thread::Builder::new()
            .name(format!("{NAME}-{}", local_addr.port()))
            .spawn(move || {
                runtime.block_on(async move {
                    let serve = axum::serve(listener, router).into_future();
                    let upkeep = async {
                        let mut ticker = tokio::time::interval(UPKEEP_INTERVAL);
                        loop {
                            ticker.tick().await;
                            handle.run_upkeep();
                        }
                    };

                    tokio::select! {
                        served = serve => {
                            if let Err(e) = served {
                                tracing::error!(address = %local_addr, error = %e, "Prometheus exporter failed");
                            }
                        }
                        _ = upkeep => {}
                        _ = signal.wait() => {
                            tracing::info!(address = %local_addr, "Prometheus exporter stopped");
                        }
                    }
                });
            })?;

        tracing::info!(address = %local_addr, "Prometheus exporter listening");
        *exporter = Some(Exporter {
            local_addr,
            shutdown,
            thread,
        });
        Ok(())
    }

    fn unload(&self) -> Result<(), BoxError> {
        let Some(exporter) = self.exporter.lock().map_err(|_| poisoned())?.take() else {
            return Ok(());
        };

        exporter.shutdown.trigger();
        exporter
            .thread
            .join()
            .map_err(|_| format!("metrics exporter thread for {} panicked", exporter.local_addr))?;
        Ok(())
    }
}

/// Scrape endpoint address of a loaded `metrics` plugin.
pub fn local_addr(plugin: &dyn Plugin) -> PluginResult<Option<SocketAddr>> {
    Ok(downcast::<MetricsPlugin>(plugin)?.local_addr())
}
