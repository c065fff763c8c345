//! HTTP transport plugin.
//!
//! # Responsibilities
//! - Bind the configured address during load, so bind errors fail the load
//! - Serve `/health` and `/info` from a dedicated server thread
//! - Apply control-plane rate limiting when enabled
//! - Register with the control-plane service registry while running
//! - Stop on unload and release the listener before unload returns
//!
//! # Design Decisions
//! - The server owns a single-threaded tokio runtime on its own thread, so
//!   the synchronous `unload` can join it whatever runtime the caller is on
//! - Graceful drain is bounded by `shutdown_grace_ms`; past it open
//!   connections are dropped

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use url::Url;

use crate::app::control_plane::{ControlPlane, ServiceInstance};
use crate::lifecycle::shutdown::Shutdown;
use crate::plugin::{downcast, BoxError, HostInfo, LoadContext, Plugin, PluginResult};

pub const NAME: &str = "http";
pub const SECTION: &str = "http";
pub const WEIGHT: i32 = 500;

/// `[http]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listen address, e.g. `0.0.0.0:8080`. Port 0 picks a free port.
    pub addr: String,
    /// Per-request timeout.
    pub request_timeout_ms: u64,
    /// Ask the control plane before serving each request.
    pub rate_limit: bool,
    /// How long unload waits for in-flight requests.
    pub shutdown_grace_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            request_timeout_ms: 30_000,
            rate_limit: false,
            shutdown_grace_ms: 5_000,
        }
    }
}

#[derive(Clone)]
struct HttpState {
    host: HostInfo,
    started: Instant,
}

#[derive(Serialize)]
struct InfoResponse {
    #[serde(flatten)]
    host: HostInfo,
    uptime_secs: u64,
}

struct Running {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    server: JoinHandle<()>,
    registration: Option<(Arc<dyn ControlPlane>, String)>,
}

/// Serves the host's health and identity over HTTP.
#[derive(Default)]
pub struct HttpPlugin {
    running: Mutex<Option<Running>>,
}

impl HttpPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound address while loaded.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running
            .lock()
            .ok()
            .and_then(|running| running.as_ref().map(|r| r.local_addr))
    }

    fn build_router(config: &HttpConfig, state: HttpState, limiter: Option<Arc<dyn ControlPlane>>) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/info", get(info_handler))
            .with_state(state);

        if let Some(limiter) = limiter {
            router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        router
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_millis(config.request_timeout_ms),
            ))
            .layer(TraceLayer::new_for_http())
    }
}

fn poisoned() -> BoxError {
    "http plugin state lock poisoned".into()
}

impl Plugin for HttpPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn weight(&self) -> i32 {
        WEIGHT
    }

    fn load(&self, ctx: &LoadContext<'_>) -> Result<(), BoxError> {
        let config: HttpConfig = ctx.config().scan()?;
        let mut running = self.running.lock().map_err(|_| poisoned())?;
        if running.is_some() {
            return Err("http server already running".into());
        }

        let std_listener = std::net::TcpListener::bind(&config.addr)
            .map_err(|e| format!("failed to bind {}: {e}", config.addr))?;
        std_listener.set_nonblocking(true)?;
        let local_addr = std_listener.local_addr()?;
        let endpoint = Url::parse(&format!("http://{}:{}", ctx.host().host, local_addr.port()))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let listener = {
            let _guard = runtime.enter();
            tokio::net::TcpListener::from_std(std_listener)?
        };

        let limiter = match (config.rate_limit, ctx.control_plane()) {
            (true, Some(cp)) => Some(Arc::clone(cp)),
            (true, None) => {
                tracing::warn!("Rate limiting requested but no control plane is available");
                None
            }
            (false, _) => None,
        };
        let state = HttpState {
            host: ctx.host().clone(),
            started: Instant::now(),
        };
        let router = Self::build_router(&config, state, limiter);

        let shutdown = Shutdown::new();
        let signal = shutdown.clone();
        let grace = Duration::from_millis(config.shutdown_grace_ms);
        let server = std::thread::Builder::new()
            .name(format!("{NAME}-{}", local_addr.port()))
            .spawn(move || {
                runtime.block_on(async move {
                    let app = router.into_make_service_with_connect_info::<SocketAddr>();
                    let drain = signal.clone();
                    let serve = axum::serve(listener, app)
                        .with_graceful_shutdown(async move { drain.wait().await })
                        .into_future();

                    tokio::select! {
                        served = serve => match served {
                            Ok(()) => tracing::info!(address = %local_addr, "HTTP server stopped"),
                            Err(e) => tracing::error!(address = %local_addr, error = %e, "HTTP server failed"),
                        },
                        _ = async {
                            signal.wait().await;
                            tokio::time::sleep(grace).await;
                        } => {
                            tracing::warn!(address = %local_addr, "Grace period elapsed, dropping open connections");
                        }
                    }
                });
            })?;
        tracing::info!(address = %local_addr, "HTTP server starting");

        let registration = ctx.control_plane().map(|cp| {
            let host = ctx.host();
            let id = host.instance_id.to_string();
            cp.register(ServiceInstance {
                id: id.clone(),
                name: host.name.clone(),
                version: host.version.clone(),
                endpoints: vec![endpoint],
            });
            (Arc::clone(cp), id)
        });

        *running = Some(Running {
            local_addr,
            shutdown,
            server,
            registration,
        });
        Ok(())
    }

    fn unload(&self) -> Result<(), BoxError> {
        let Some(running) = self.running.lock().map_err(|_| poisoned())?.take() else {
            return Ok(());
        };

        if let Some((cp, id)) = running.registration {
            cp.deregister(&id);
        }
        tracing::info!(address = %running.local_addr, "HTTP server shutting down");
        running.shutdown.trigger();
        running
            .server
            .join()
            .map_err(|_| format!("http server thread for {} panicked", running.local_addr))?;
        Ok(())
    }
}

/// Bound address of a loaded `http` plugin.
pub fn local_addr(plugin: &dyn Plugin) -> PluginResult<Option<SocketAddr>> {
    Ok(downcast::<HttpPlugin>(plugin)?.local_addr())
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn info_handler(State(state): State<HttpState>) -> impl IntoResponse {
    Json(InfoResponse {
        host: state.host,
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

async fn rate_limit_middleware(
    State(limiter): State<Arc<dyn ControlPlane>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = addr.ip().to_string();
    if limiter.allow(&key) {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, "Rate limit exceeded");
        (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response()
    }
}
