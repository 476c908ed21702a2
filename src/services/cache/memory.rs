//! Bounded in-memory cache backend.
//!
//! Entries carry their own expiry (derived from the token's `exp`), checked lazily on read.
//! When the store is full, expired entries are dropped first, then the least recently
//! promoted ones, `items_to_prune` at a time. An item is promoted only every
//! `gets_per_promote` reads. For plain LRU see
//! [`LruCache`](crate::services::cache::LruCache).
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::services::cache::client::{CacheClient, CacheLookup, CacheResult, MAX_ENTRY_LIFETIME};

pub const DEFAULT_MAX_SIZE: usize = 5000;
pub const DEFAULT_ITEMS_TO_PRUNE: usize = 100;
pub const DEFAULT_GETS_PER_PROMOTE: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryCacheConfig {
    pub max_size: usize,
    // Number of items evicted at once when the store is full.
    pub items_to_prune: usize,
    // An item moves to the retained end only after this many reads.
    pub gets_per_promote: u32,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            items_to_prune: DEFAULT_ITEMS_TO_PRUNE,
            gets_per_promote: DEFAULT_GETS_PER_PROMOTE,
        }
    }
}

struct Entry {
    value: String,
    expires_at: Instant,
    // Position in `Store::recency`; lower is evicted first.
    tick: u64,
    gets: u32,
}

#[derive(Default)]
struct Store {
    entries: HashMap<String, Entry>,
    recency: BTreeMap<u64, String>,
    next_tick: u64,
}

impl Store {
    fn next_tick(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.tick);
        Some(entry)
    }

    fn promote(&mut self, key: &str) {
        let tick = self.next_tick();
        if let Some(entry) = self.entries.get_mut(key) {
            self.recency.remove(&entry.tick);
            entry.tick = tick;
            entry.gets = 0;
            self.recency.insert(tick, key.to_string());
        }
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    fn prune(&mut self, count: usize) -> usize {
        let victims: Vec<u64> = self.recency.keys().take(count).copied().collect();
        for tick in &victims {
            if let Some(key) = self.recency.remove(tick) {
                self.entries.remove(&key);
            }
        }
        victims.len()
    }
}

/// In-memory cache with per-item expiry and bounded size.
///
/// All bookkeeping (recency, promotion counters) sits behind one mutex; no lock is held
/// across an `.await`.
pub struct MemoryCache {
    config: MemoryCacheConfig,
    store: Mutex<Store>,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(MemoryCacheConfig::default())
    }
}

impl MemoryCache {
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self {
            config,
            store: Mutex::new(Store::default()),
        }
    }

    pub fn config(&self) -> &MemoryCacheConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored entries, expired ones included until they are read or purged.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookup(&self, key: &str) -> CacheLookup {
        let now = Instant::now();
        let mut store = self.lock();

        let Some(entry) = store.entries.get_mut(key) else {
            return CacheLookup::Missing;
        };

        if entry.expires_at <= now {
            store.remove(key);
            return CacheLookup::Expired;
        }

        entry.gets += 1;
        let value = entry.value.clone();
        let promote = entry.gets >= self.config.gets_per_promote.max(1);

        if promote {
            store.promote(key);
        }

        CacheLookup::Hit(value)
    }

    pub fn insert(&self, key: &str, value: &str, ttl: Duration) {
        let now = Instant::now();
        let mut store = self.lock();

        store.remove(key);
        if ttl.is_zero() {
            return;
        }

        let max_size = self.config.max_size.max(1);
        if store.entries.len() >= max_size {
            let purged = store.purge_expired(now);
            let pruned = if store.entries.len() >= max_size {
                store.prune(self.config.items_to_prune.max(1))
            } else {
                0
            };
            debug!(purged, pruned, "memory cache full, evicted entries");
        }

        let expires_at = now
            .checked_add(ttl.min(MAX_ENTRY_LIFETIME))
            .unwrap_or(now + MAX_ENTRY_LIFETIME);
        let tick = store.next_tick();
        store.recency.insert(tick, key.to_string());
        store.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
                tick,
                gets: 0,
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        self.lock().purge_expired(now)
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_string(&self, key: &str) -> CacheResult<CacheLookup> {
        Ok(self.lookup(key))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.insert(key, value, ttl);
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        Ok(u64::from(self.remove(key)))
    }
}

/// Spawn a background task that periodically purges expired entries.
///
/// Lazy expiry on read stays in place; this only bounds memory held by entries that are
/// never read again. Abort the returned handle to stop it.
pub fn spawn_sweeper(cache: Arc<MemoryCache>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);

        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let purged = cache.purge_expired();
            if purged > 0 {
                info!(purged, remaining = cache.len(), "memory cache sweep completed");
            } else {
                debug!("memory cache sweep: nothing expired");
            }
        }
    })
}
