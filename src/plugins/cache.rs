//! In-process key/value cache plugin.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use serde::Deserialize;

use crate::plugin::{downcast, BoxError, LoadContext, Plugin, PluginResult};

pub const NAME: &str = "cache";
pub const SECTION: &str = "cache";
pub const WEIGHT: i32 = 300;

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime.
    pub ttl_secs: u64,
    /// Upper bound on stored entries.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_entries: 10_000,
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Thread-safe TTL cache with a size bound.
#[derive(Debug)]
pub struct LocalCache {
    entries: DashMap<String, Entry>,
    ttl: Duration,
    max_entries: usize,
}

impl LocalCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries,
        }
    }

    /// Live value for `key`. Expired entries are dropped on access.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, e| e.expires_at <= now);
        None
    }

    /// Store `value`, evicting expired entries first and then the entry
    /// closest to expiry when the cache is full.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if self.max_entries == 0 {
            return;
        }
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.purge_expired();
            if self.entries.len() >= self.max_entries {
                self.evict_soonest();
            }
        }
        self.entries.insert(
            key,
            Entry {
                value: value.into(),
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries.remove(key).map(|(_, e)| e.value)
    }

    /// Drop every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn evict_soonest(&self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|e| e.expires_at)
            .map(|e| e.key().clone());
        if let Some(key) = victim {
            self.entries.remove(&key);
        }
    }
}

/// Owns a [`LocalCache`] between load and unload.
#[derive(Default)]
pub struct CachePlugin {
    cache: ArcSwapOption<LocalCache>,
}

impl CachePlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache while loaded.
    pub fn cache(&self) -> Option<Arc<LocalCache>> {
        self.cache.load_full()
    }
}

impl Plugin for CachePlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn weight(&self) -> i32 {
        WEIGHT
    }

    fn load(&self, ctx: &LoadContext<'_>) -> Result<(), BoxError> {
        let config: CacheConfig = ctx.config().scan()?;
        if config.ttl_secs == 0 {
            return Err("cache ttl_secs must be greater than zero".into());
        }

        let cache = LocalCache::new(Duration::from_secs(config.ttl_secs), config.max_entries);
        self.cache.store(Some(Arc::new(cache)));
        tracing::info!(ttl_secs = config.ttl_secs, max_entries = config.max_entries, "Cache ready");
        Ok(())
    }

    fn unload(&self) -> Result<(), BoxError> {
        if let Some(cache) = self.cache.swap(None) {
            tracing::debug!(entries = cache.len(), "Cache dropped");
            cache.clear();
        }
        Ok(())
    }
}

/// Typed accessor for a `cache` plugin.
pub fn cache(plugin: &dyn Plugin) -> PluginResult<Option<Arc<LocalCache>>> {
    Ok(downcast::<CachePlugin>(plugin)?.cache())
}
