//! Cache client interface used by the introspection cache.
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Upper bound for an entry's lifetime when `exp` is absurdly far away. Every backend
/// clamps to it.
pub const MAX_ENTRY_LIFETIME: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Cache-layer errors (transport/command/serialization).
///
/// Note:
/// - We keep this independent from `VerifierError` so the verifier can decide how to fail
///   (a broken cache never decides a token verdict, the authorization server does).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
    #[error("cache value error: {0}")]
    InvalidValue(String),
}

/// Outcome of a cache read.
///
/// `Expired` is only reported by backends that keep expired items around until they are
/// read (the in-memory store). Backends with native TTL report `Missing` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(String),
    Missing,
    Expired,
}

impl CacheLookup {
    pub fn into_hit(self) -> Option<String> {
        match self {
            CacheLookup::Hit(value) => Some(value),
            CacheLookup::Missing | CacheLookup::Expired => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }
}

/// A minimal cache interface.
///
/// This is intentionally small and string-based:
/// - put with an expiry, get, delete.
/// - An expiry of zero means "expires immediately": the value must never be returned.
///
/// Implementations are shared as `Arc<dyn CacheClient>` and must serialize their own
/// mutations.
#[async_trait]
pub trait CacheClient: Send + Sync + 'static {
    // Returns the cache backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Get UTF-8 string value. Expired items must not be returned.
    async fn get_string(&self, key: &str) -> CacheResult<CacheLookup>;

    // Set value with TTL, replacing any previous value.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    // Delete a key. Returns number of deleted keys.
    async fn del(&self, key: &str) -> CacheResult<u64>;
}
