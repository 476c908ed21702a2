pub mod client;
pub mod factory;
pub mod lru;
pub mod memory;
pub mod valkey;

pub use client::{CacheClient, CacheError, CacheLookup, CacheResult, MAX_ENTRY_LIFETIME};
pub use factory::{CacheConfig, build_cache};
pub use lru::LruCache;
pub use memory::{MemoryCache, MemoryCacheConfig};
pub use valkey::ValkeyClient;
