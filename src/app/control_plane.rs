//! Control-plane facilities shared with plugins.
//!
//! # Responsibilities
//! - Rate limiting decisions keyed by caller
//! - Service registration and lookup
//! - Version-aware instance selection
//! - Fetching named configuration documents
//!
//! # Design Decisions
//! - One trait per facility so a plugin only depends on what it uses
//! - `ControlPlane` is a blanket supertrait, any type implementing all four
//!   facilities qualifies
//! - The host never calls into the control plane itself; it only hands it to
//!   plugins through `HostInfo`

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{load_config, Config, ConfigError};

/// One reachable instance of a named service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Unique id, usually the host instance id.
    pub id: String,
    /// Service name.
    pub name: String,
    /// Service version.
    pub version: String,
    /// Where the service can be reached.
    pub endpoints: Vec<Url>,
}

/// Admission control.
pub trait Limiter: Send + Sync {
    /// Whether one more request for `key` may proceed now.
    fn allow(&self, key: &str) -> bool;
}

/// Service directory.
pub trait ServiceRegistry: Send + Sync {
    /// Add or replace an instance (keyed by `id`).
    fn register(&self, instance: ServiceInstance);
    /// Remove an instance. Returns `false` when it was not registered.
    fn deregister(&self, id: &str) -> bool;
    /// Every registered instance of `name`.
    fn discover(&self, name: &str) -> Vec<ServiceInstance>;
}

/// Instance selection policy.
pub trait Router: Send + Sync {
    /// Narrow `candidates` for `service` down to the routable ones.
    fn select(&self, service: &str, candidates: Vec<ServiceInstance>) -> Vec<ServiceInstance>;
}

/// Remote or local configuration documents.
pub trait ConfigSource: Send + Sync {
    /// Fetch `file_name` from `group` (empty group = root).
    fn fetch(&self, file_name: &str, group: &str) -> Result<Config, ConfigError>;
}

/// Everything a plugin may ask of the control plane.
pub trait ControlPlane: Limiter + ServiceRegistry + Router + ConfigSource {}

impl<T> ControlPlane for T where T: Limiter + ServiceRegistry + Router + ConfigSource {}

/// Settings for [`LocalControlPlane`], read from the `[control_plane]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalControlPlaneConfig {
    /// Sustained requests per second per key.
    pub rate_per_sec: f64,
    /// Bucket capacity per key.
    pub burst: f64,
    /// Root directory for `ConfigSource::fetch`.
    pub config_dir: PathBuf,
}

impl Default for LocalControlPlaneConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: 100.0,
            burst: 200.0,
            config_dir: PathBuf::from("configs"),
        }
    }
}

/// Limiter calls between two sweeps of idle buckets.
const EVICT_EVERY: u64 = 1024;

struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// In-process control plane.
pub struct LocalControlPlane {
    config: LocalControlPlaneConfig,
    buckets: DashMap<String, TokenBucket>,
    limiter_calls: AtomicU64,
    /// Instance id → instance.
    instances: DashMap<String, ServiceInstance>,
    /// Service name → pinned version.
    pins: DashMap<String, String>,
}

impl LocalControlPlane {
    pub fn new(config: LocalControlPlaneConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
            limiter_calls: AtomicU64::new(0),
            instances: DashMap::new(),
            pins: DashMap::new(),
        }
    }

    /// Route `service` only to instances of `version`.
    pub fn pin_version(&self, service: impl Into<String>, version: impl Into<String>) {
        self.pins.insert(service.into(), version.into());
    }

    /// Remove a version pin. Returns the previous pin.
    pub fn unpin(&self, service: &str) -> Option<String> {
        self.pins.remove(service).map(|(_, version)| version)
    }

    /// Drop rate-limit buckets that have refilled completely. A full bucket
    /// behaves exactly like a fresh one, so eviction never changes a decision.
    ///
    /// Returns how many buckets were dropped.
    pub fn evict_idle(&self) -> usize {
        let rate = self.config.rate_per_sec;
        if rate <= 0.0 {
            return 0;
        }

        let refill = Duration::try_from_secs_f64(self.config.burst.max(0.0) / rate).unwrap_or(Duration::MAX);
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| bucket.last_update.elapsed() < refill);
        let evicted = before.saturating_sub(self.buckets.len());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.buckets.len(), "Evicted idle rate-limit buckets");
        }
        evicted
    }

    /// Number of keys currently tracked by the limiter.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn document_path(&self, file_name: &str, group: &str) -> Result<PathBuf, ConfigError> {
        let relative = Path::new(group).join(file_name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || file_name.is_empty() {
            return Err(ConfigError::Io {
                path: relative,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "document path must stay inside the config directory",
                ),
            });
        }
        Ok(self.config.config_dir.join(relative))
    }
}

impl Default for LocalControlPlane {
    fn default() -> Self {
        Self::new(LocalControlPlaneConfig::default())
    }
}

impl std::fmt::Debug for LocalControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalControlPlane")
            .field("config", &self.config)
            .field("instances", &self.instances.len())
            .field("pins", &self.pins.len())
            .finish()
    }
}

impl Limiter for LocalControlPlane {
    fn allow(&self, key: &str) -> bool {
        if self.limiter_calls.fetch_add(1, Ordering::Relaxed) % EVICT_EVERY == EVICT_EVERY - 1 {
            self.evict_idle();
        }

        let burst = self.config.burst;
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(burst));
        bucket.try_acquire(burst, self.config.rate_per_sec)
    }
}

impl ServiceRegistry for LocalControlPlane {
    fn register(&self, instance: ServiceInstance) {
        tracing::debug!(service = %instance.name, id = %instance.id, "Service instance registered");
        self.instances.insert(instance.id.clone(), instance);
    }

    fn deregister(&self, id: &str) -> bool {
        self.instances.remove(id).is_some()
    }

    fn discover(&self, name: &str) -> Vec<ServiceInstance> {
        let mut found: Vec<ServiceInstance> = self
            .instances
            .iter()
            .filter(|entry| entry.name == name)
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }
}

impl Router for LocalControlPlane {
    fn select(&self, service: &str, candidates: Vec<ServiceInstance>) -> Vec<ServiceInstance> {
        match self.pins.get(service) {
            Some(pin) => candidates
                .into_iter()
                .filter(|instance| instance.version == *pin)
                .collect(),
            None => candidates,
        }
    }
}

impl ConfigSource for LocalControlPlane {
    fn fetch(&self, file_name: &str, group: &str) -> Result<Config, ConfigError> {
        let path = self.document_path(file_name, group)?;
        load_config(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: &str, version: &str) -> ServiceInstance {
        ServiceInstance {
            id: id.to_string(),
            name: "orders".to_string(),
            version: version.to_string(),
            endpoints: vec![Url::parse("http://127.0.0.1:8080").unwrap()],
        }
    }

    #[test]
    fn test_limiter_exhausts_burst() {
        let cp = LocalControlPlane::new(LocalControlPlaneConfig {
            rate_per_sec: 0.0,
            burst: 2.0,
            ..Default::default()
        });

        assert!(cp.allow("10.0.0.1"));
        assert!(cp.allow("10.0.0.1"));
        assert!(!cp.allow("10.0.0.1"));
        assert!(cp.allow("10.0.0.2"));
    }

    #[test]
    fn test_evict_idle_drops_refilled_buckets() {
        let cp = LocalControlPlane::new(LocalControlPlaneConfig {
            rate_per_sec: 1000.0,
            burst: 1.0,
            ..Default::default()
        });
        for key in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            assert!(cp.allow(key));
        }
        assert_eq!(cp.bucket_count(), 3);

        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cp.evict_idle(), 3);
        assert_eq!(cp.bucket_count(), 0);
        assert!(cp.allow("10.0.0.1"));
    }

    #[test]
    fn test_evict_idle_keeps_draining_buckets() {
        let cp = LocalControlPlane::new(LocalControlPlaneConfig {
            rate_per_sec: 0.0,
            burst: 1.0,
            ..Default::default()
        });
        assert!(cp.allow("10.0.0.1"));

        assert_eq!(cp.evict_idle(), 0);
        assert!(!cp.allow("10.0.0.1"));
    }

    #[test]
    fn test_allow_sweeps_periodically() {
        let cp = LocalControlPlane::new(LocalControlPlaneConfig {
            rate_per_sec: 1_000_000.0,
            burst: 1.0,
            ..Default::default()
        });
        for i in 0..EVICT_EVERY {
            cp.allow(&format!("client-{i}"));
            std::thread::sleep(Duration::from_micros(2));
        }

        assert!(cp.bucket_count() < EVICT_EVERY as usize);
    }

    #[test]
    fn test_registry_roundtrip() {
        let cp = LocalControlPlane::default();
        cp.register(instance("b", "1.0"));
        cp.register(instance("a", "1.1"));

        let found = cp.discover("orders");
        assert_eq!(found.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(cp.discover("billing").is_empty());

        assert!(cp.deregister("a"));
        assert!(!cp.deregister("a"));
        assert_eq!(cp.discover("orders").len(), 1);
    }

    #[test]
    fn test_router_version_pin() {
        let cp = LocalControlPlane::default();
        let candidates = vec![instance("a", "1.0"), instance("b", "2.0")];

        assert_eq!(cp.select("orders", candidates.clone()).len(), 2);

        cp.pin_version("orders", "2.0");
        let selected = cp.select("orders", candidates.clone());
        assert_eq!(selected, vec![instance("b", "2.0")]);

        assert_eq!(cp.unpin("orders").as_deref(), Some("2.0"));
        assert_eq!(cp.select("orders", candidates).len(), 2);
    }

    #[test]
    fn test_config_source_rejects_escape() {
        let cp = LocalControlPlane::default();
        assert!(cp.fetch("secrets.toml", "..").is_err());
        assert!(cp.fetch("", "group").is_err());
    }

    #[test]
    fn test_config_source_reads_group_file() {
        let dir = std::env::temp_dir().join(format!("plughost-cp-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("payments")).unwrap();
        std::fs::write(dir.join("payments").join("limits.toml"), "[limits]\nmax = 5\n").unwrap();

        let cp = LocalControlPlane::new(LocalControlPlaneConfig {
            config_dir: dir.clone(),
            ..Default::default()
        });
        let config = cp.fetch("limits.toml", "payments").unwrap();
        assert!(config.value("limits.max").is_present());

        std::fs::remove_dir_all(dir).ok();
    }
}
