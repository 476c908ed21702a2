//! Plain bounded LRU backend on `moka`.
//!
//! Every read refreshes recency; each entry expires after its own TTL.
use async_trait::async_trait;
use moka::{Expiry, future::Cache, policy::EvictionPolicy};
use std::time::{Duration, Instant};

use crate::services::cache::client::{CacheClient, CacheLookup, CacheResult, MAX_ENTRY_LIFETIME};

#[derive(Clone)]
struct Stored {
    value: String,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, Stored> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        stored: &Stored,
        _at: Instant,
    ) -> Option<Duration> {
        Some(stored.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        stored: &Stored,
        _at: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(stored.ttl)
    }
}

pub struct LruCache {
    max_size: u64,
    inner: Cache<String, Stored>,
}

impl std::fmt::Debug for LruCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("max_size", &self.max_size)
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

impl LruCache {
    pub fn new(max_size: usize) -> Self {
        let max_size = u64::try_from(max_size.max(1)).unwrap_or(u64::MAX);
        let inner: Cache<String, Stored> = Cache::builder()
            .max_capacity(max_size)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(PerEntryTtl)
            .build();

        Self { max_size, inner }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Approximate entry count; pending evictions are applied first.
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}

#[async_trait]
impl CacheClient for LruCache {
    fn backend_name(&self) -> &'static str {
        "memory-lru"
    }

    async fn get_string(&self, key: &str) -> CacheResult<CacheLookup> {
        Ok(self
            .inner
            .get(key)
            .await
            .map_or(CacheLookup::Missing, |stored| CacheLookup::Hit(stored.value)))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        if ttl.is_zero() {
            self.inner.invalidate(key).await;
            return Ok(());
        }

        let stored = Stored {
            value: value.to_string(),
            ttl: ttl.min(MAX_ENTRY_LIFETIME),
        };
        self.inner.insert(key.to_string(), stored).await;
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        Ok(u64::from(self.inner.remove(key).await.is_some()))
    }
}
