use async_trait::async_trait;
use std::time::Duration;

use crate::services::cache::client::{
    CacheClient, CacheError, CacheLookup, CacheResult, MAX_ENTRY_LIFETIME,
};

/// Valkey/Redis-backed cache client.
///
/// Expiry is delegated entirely to the server (`SET ... PX`); an expired key simply reads
/// back as `Missing`.
#[derive(Clone)]
pub struct ValkeyClient {
    manager: redis::aio::ConnectionManager,
}

impl std::fmt::Debug for ValkeyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValkeyClient").finish_non_exhaustive()
    }
}

impl ValkeyClient {
    // Create a Valkey client from a URL like `redis://localhost:6379`
    pub async fn new(url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        Ok(Self { manager })
    }
}

#[async_trait]
impl CacheClient for ValkeyClient {
    fn backend_name(&self) -> &'static str {
        "valkey"
    }

    async fn get_string(&self, key: &str) -> CacheResult<CacheLookup> {
        // Use a clone of the connection manager
        let mut conn = self.manager.clone();

        let resp: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        Ok(resp.map_or(CacheLookup::Missing, CacheLookup::Hit))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        // A zero TTL means the entry is already dead: drop whatever is there instead of
        // sending `PX 0`, which the server rejects.
        if ttl.is_zero() {
            self.del(key).await?;
            return Ok(());
        }

        let mut conn = self.manager.clone();

        // SET key value PX <millis>
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(px_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        let mut conn = self.manager.clone();

        // DEL returns number of keys removed (0 or 1 for a single key).
        let n: u64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        Ok(n)
    }
}

/// `PX` argument for a TTL: millisecond precision so sub-second remainders are not rounded
/// up, clamped to [`MAX_ENTRY_LIFETIME`] so the server never refuses the expiry.
fn px_millis(ttl: Duration) -> u64 {
    let millis = ttl.min(MAX_ENTRY_LIFETIME).as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX).max(1)
}
