/// Factory: build the introspection cache backend from an explicit `CacheConfig`.
use std::{sync::Arc, time::Duration};

use tracing::info;

use crate::services::cache::{
    CacheClient, CacheError, LruCache, MemoryCache, MemoryCacheConfig, ValkeyClient,
    memory::spawn_sweeper,
};

/// Recognised cache backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheConfig {
    Memory {
        config: MemoryCacheConfig,
        // Background purge of expired entries; `None` keeps lazy expiry only.
        sweep_interval: Option<Duration>,
    },
    // Plain LRU with per-entry expiry.
    Lru {
        max_size: usize,
    },
    Valkey {
        url: String,
    },
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::Memory {
            config: MemoryCacheConfig::default(),
            sweep_interval: None,
        }
    }
}

pub async fn build_cache(config: &CacheConfig) -> Result<Arc<dyn CacheClient>, CacheError> {
    match config {
        CacheConfig::Memory {
            config,
            sweep_interval,
        } => {
            let cache = Arc::new(MemoryCache::new(*config));
            if let Some(every) = sweep_interval {
                spawn_sweeper(cache.clone(), *every);
            }
            info!(
                backend = cache.backend_name(),
                max_size = config.max_size,
                "introspection cache ready"
            );
            Ok(cache)
        }
        CacheConfig::Lru { max_size } => {
            let cache = LruCache::new(*max_size);
            info!(
                backend = cache.backend_name(),
                max_size = cache.max_size(),
                "introspection cache ready"
            );
            Ok(Arc::new(cache))
        }
        CacheConfig::Valkey { url } => {
            let client = ValkeyClient::new(url).await?;
            info!(backend = client.backend_name(), "introspection cache ready");
            Ok(Arc::new(client))
        }
    }
}
