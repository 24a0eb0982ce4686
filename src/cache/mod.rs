//! Caching module for MedQuery-RS
//!
//! Two tiers: an optional durable store shared across processes, and a bounded
//! in-process tier that is always available. Reads consult the durable tier
//! first, then the in-process tier; writes go to both. Durable-tier failures
//! are logged and treated as misses.

mod durable;
mod memory;

pub use durable::{DurableStore, RedisStore};
pub use memory::MemoryTier;

use crate::config::CacheSettings;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Length of the encoded part of a cache key
pub const KEY_PREFIX_LEN: usize = 32;

/// Build a cache key: `<namespace>:<base64(input)[0:32]>`.
///
/// Inputs whose encodings share the first 32 characters collide.
pub fn cache_key(namespace: &str, input: &str) -> String {
    let encoded = STANDARD.encode(input.as_bytes());
    let end = encoded.len().min(KEY_PREFIX_LEN);
    format!("{}:{}", namespace, &encoded[..end])
}

/// Status of one cache tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TierStatus {
    Healthy,
    Unhealthy,
    /// Not configured (in-process-only mode)
    Disabled,
}

/// Health of both tiers
#[derive(Debug, Clone, Serialize)]
pub struct CacheHealth {
    pub memory: TierStatus,
    pub durable: TierStatus,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheHealth {
    pub fn is_degraded(&self) -> bool {
        self.memory != TierStatus::Healthy || self.durable == TierStatus::Unhealthy
    }
}

/// Two-tier cache
pub struct CacheManager {
    namespace: String,
    default_ttl: Duration,
    durable: Option<Arc<dyn DurableStore>>,
    memory: MemoryTier,
}

impl CacheManager {
    /// In-process-only cache
    pub fn new(namespace: impl Into<String>, max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            namespace: namespace.into(),
            default_ttl,
            durable: None,
            memory: MemoryTier::new(max_entries),
        }
    }

    /// Attach a durable tier
    pub fn with_durable(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.durable = Some(store);
        self
    }

    /// Build from settings, connecting to the durable tier when a URL is set.
    ///
    /// A missing or unreachable durable tier leaves the cache in
    /// in-process-only mode.
    pub async fn from_settings(settings: &CacheSettings) -> Self {
        let cache = Self::new(
            settings.namespace.clone(),
            settings.max_entries,
            Duration::from_secs(settings.default_ttl),
        );

        let Some(url) = settings.redis_url.as_deref() else {
            info!("No durable cache configured, using in-process cache only");
            return cache;
        };

        match RedisStore::connect(url, Duration::from_secs_f64(settings.connect_timeout)).await {
            Ok(store) => cache.with_durable(Arc::new(store)),
            Err(e) => {
                warn!("Durable cache unavailable, using in-process cache only: {}", e);
                cache
            }
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn has_durable(&self) -> bool {
        self.durable.is_some()
    }

    /// Key for an input in this cache's namespace
    pub fn key_for(&self, input: &str) -> String {
        cache_key(&self.namespace, input)
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(store) = &self.durable {
            match store.get(key).await {
                Ok(Some(value)) => {
                    debug!("Durable cache hit: {}", key);
                    return Some(value);
                }
                Ok(None) => {}
                Err(e) => warn!("Durable cache read failed ({}): {}", store.name(), e),
            }
        }

        let value = self.memory.get(key);
        if value.is_some() {
            debug!("Memory cache hit: {}", key);
        }
        value
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        if let Some(store) = &self.durable {
            if let Err(e) = store.set(key, &value, ttl).await {
                warn!("Durable cache write failed ({}): {}", store.name(), e);
            }
        }

        self.memory.set(key, value, ttl);
    }

    /// Read and deserialize a JSON value; undecodable entries are misses
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    /// Serialize and store a JSON value
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.set(key, bytes, ttl).await,
            Err(e) => warn!("Failed to serialize cache entry {}: {}", key, e),
        }
    }

    pub fn clear_memory(&self) {
        self.memory.clear();
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub async fn health_check(&self) -> CacheHealth {
        let durable = match &self.durable {
            None => TierStatus::Disabled,
            Some(store) => match store.ping().await {
                Ok(()) => TierStatus::Healthy,
                Err(e) => {
                    warn!("Durable cache health check failed: {}", e);
                    TierStatus::Unhealthy
                }
            },
        };

        CacheHealth {
            memory: TierStatus::Healthy,
            durable,
            entries: self.memory.len(),
            capacity: self.memory.capacity(),
        }
    }
}
