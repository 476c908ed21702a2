use sha2::{Digest, Sha256};
use std::{sync::Arc, time::Duration};

use crate::services::cache::{CacheClient, CacheError, CacheLookup, CacheResult};
use crate::services::oauth::types::IntrospectionRecord;

/// Introspection results stored through any `CacheClient`.
///
/// Keys are `<prefix>:<sha256(token) hex>` so raw bearer tokens never reach the backend and
/// every backend sees the same key layout.
#[derive(Clone)]
pub struct TokenCache {
    cache: Arc<dyn CacheClient>,
    prefix: String,
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("backend", &self.cache.backend_name())
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl TokenCache {
    pub fn new(cache: Arc<dyn CacheClient>, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, token: &str) -> String {
        let digest = Sha256::digest(token.as_bytes());
        format!("{}:{}", self.prefix, hex::encode(digest))
    }

    pub fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }

    pub async fn lookup(&self, token: &str) -> CacheResult<CacheLookup> {
        self.cache.get_string(&self.key(token)).await
    }

    pub async fn get(&self, token: &str) -> CacheResult<Option<IntrospectionRecord>> {
        let Some(raw) = self.lookup(token).await?.into_hit() else {
            return Ok(None);
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| CacheError::InvalidValue(e.to_string()))
    }

    pub async fn put(
        &self,
        token: &str,
        record: &IntrospectionRecord,
        ttl: Duration,
    ) -> CacheResult<()> {
        let raw =
            serde_json::to_string(record).map_err(|e| CacheError::InvalidValue(e.to_string()))?;
        self.cache.set_with_ttl(&self.key(token), &raw, ttl).await
    }

    pub async fn remove(&self, token: &str) -> CacheResult<bool> {
        Ok(self.cache.del(&self.key(token)).await? > 0)
    }
}
