//! Transient cache and the render cache version counter.
//!
//! Two namespaces share one in-process `moka` cache:
//!
//! - the raw product list under [`PRODUCTS_KEY`] (15 minute TTL)
//! - rendered grid markup under `catalog:grid:v{version}:{hash}` (5 minute TTL)
//!
//! Each entry carries its own TTL. Grid entries are never deleted explicitly:
//! bumping the [`CacheVersionStore`] changes every key the renderer computes,
//! so old entries become unreachable and age out.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;

use catalog_bridge_core::ExternalProduct;

use crate::db::RepositoryError;

/// Cache key of the raw product list.
pub const PRODUCTS_KEY: &str = "catalog:products";

/// Prefix shared by all rendered grid keys.
pub const GRID_KEY_PREFIX: &str = "catalog:grid:";

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Products(Arc<Vec<ExternalProduct>>),
    Html(Arc<str>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: CacheValue,
    ttl: Duration,
}

/// Expires every entry after the TTL it was stored with.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process key/value store with per-entry expiry.
#[derive(Clone)]
pub struct TransientCache {
    inner: Cache<String, Entry>,
}

impl TransientCache {
    /// Create a cache holding at most `max_capacity` entries.
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { inner }
    }

    /// Get a live entry.
    pub async fn get(&self, key: &str) -> Option<CacheValue> {
        self.inner.get(key).await.map(|entry| entry.value)
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    pub async fn set(&self, key: &str, value: CacheValue, ttl: Duration) {
        self.inner.insert(key.to_owned(), Entry { value, ttl }).await;
    }

    /// Remove an entry if present.
    pub async fn delete(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}

impl Default for TransientCache {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Persistent counter that namespaces rendered grid keys.
#[async_trait]
pub trait CacheVersionStore: Send + Sync {
    /// Current version (1 before the first bump).
    async fn current(&self) -> Result<i64, RepositoryError>;

    /// Increment the version and return the new value.
    async fn bump(&self) -> Result<i64, RepositoryError>;
}

/// Process-local version counter, used in tests and single-node dev runs.
#[derive(Debug)]
pub struct MemoryCacheVersion {
    value: AtomicI64,
}

impl MemoryCacheVersion {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryCacheVersion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheVersionStore for MemoryCacheVersion {
    async fn current(&self) -> Result<i64, RepositoryError> {
        Ok(self.value.load(Ordering::SeqCst))
    }

    async fn bump(&self) -> Result<i64, RepositoryError> {
        Ok(self.value.fetch_add(1, Ordering::SeqCst) + 1)
    }
}
