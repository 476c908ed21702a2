//! Relying-party verifier: code exchange, cached introspection, user info, identity token
//! validation and revocation.
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::services::cache::{CacheClient, MemoryCache};
use crate::services::oauth::{
    config::VerifierConfig,
    endpoint::{EndpointClient, EndpointError},
    jwks::{SignatureError, SignatureValidator},
    token_cache::TokenCache,
    types::{IdentityClaims, IntrospectionRecord, Token, UserInfo},
};

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error("token isn't active")]
    TokenInactive,
    #[error("token is owned by another client")]
    ForeignClient,
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error("identity token audience does not match client")]
    AudienceMismatch,
    #[error("cannot build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl VerifierError {
    /// The presented token is unusable (unauthorized), as opposed to the verifier being
    /// unable to reach a verdict.
    pub fn is_token_rejection(&self) -> bool {
        match self {
            Self::TokenInactive | Self::ForeignClient | Self::AudienceMismatch => true,
            Self::Signature(e) => e.is_token_fault(),
            Self::Endpoint(e) => e.is_token_refusal(),
            Self::HttpClient(_) | Self::Config(_) => false,
        }
    }

    /// The authorization server could not be reached, refused this client, or answered
    /// unexpectedly. Includes unusable signing keys.
    pub fn is_upstream_failure(&self) -> bool {
        match self {
            Self::Endpoint(e) => !e.is_token_refusal(),
            Self::Signature(e) => !e.is_token_fault(),
            _ => false,
        }
    }
}

/// Verifies tokens for one OAuth2 client.
///
/// Construct once and share (`Arc<Verifier>`); configuration is fixed for the lifetime of
/// the instance.
pub struct Verifier {
    config: Arc<VerifierConfig>,
    endpoints: EndpointClient,
    signatures: SignatureValidator,
    cache: TokenCache,
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Verifier {
    pub fn new(config: VerifierConfig, cache: Arc<dyn CacheClient>) -> Result<Self, VerifierError> {
        let http = EndpointClient::build_http_client(&config).map_err(VerifierError::HttpClient)?;
        let config = Arc::new(config);

        let endpoints = EndpointClient::new(http, config.clone())?;
        let signatures = SignatureValidator::new(
            endpoints.clone(),
            config.id_token_leeway_seconds,
            config.key_set_ttl,
        );
        let cache = TokenCache::new(cache, config.cache_key_prefix.clone());

        Ok(Self {
            config,
            endpoints,
            signatures,
            cache,
        })
    }

    /// Verifier backed by the default bounded in-memory cache.
    pub fn with_memory_cache(config: VerifierConfig) -> Result<Self, VerifierError> {
        Self::new(config, Arc::new(MemoryCache::default()))
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn token_cache(&self) -> &TokenCache {
        &self.cache
    }

    pub fn authorize_url(&self, state: &str, extra: &[(&str, &str)]) -> String {
        self.endpoints.authorize_url(state, extra)
    }

    pub fn logout_url(&self, redirect: &str) -> String {
        self.config.logout_url(redirect)
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange(&self, code: &str) -> Result<Token, VerifierError> {
        Ok(self.endpoints.exchange_code(code).await?)
    }

    /// Check whether a token is active and issued to this client.
    ///
    /// Cache first: a hit is returned as stored. On a miss the authorization server is asked,
    /// and only an active token owned by this client is cached, until its `exp`.
    /// Cache backend failures are logged and never decide the verdict.
    pub async fn introspect(&self, token: &str) -> Result<IntrospectionRecord, VerifierError> {
        match self.cache.get(token).await {
            Ok(Some(record)) => {
                debug!(backend = self.cache.backend_name(), "introspection cache hit");
                return Ok(record);
            }
            Ok(None) => debug!(backend = self.cache.backend_name(), "introspection cache miss"),
            Err(err) => warn!(
                error = %err,
                backend = self.cache.backend_name(),
                "introspection cache read failed, asking authorization server"
            ),
        }

        let record = self.endpoints.introspect(token).await?;

        if !record.active {
            self.forget(token).await;
            return Err(VerifierError::TokenInactive);
        }
        if record.client_id != self.config.client_id() {
            warn!(client_id = %record.client_id, "token is owned by another client");
            self.forget(token).await;
            return Err(VerifierError::ForeignClient);
        }

        let ttl = record.remaining_ttl(Utc::now().timestamp());
        if let Err(err) = self.cache.put(token, &record, ttl).await {
            warn!(
                error = %err,
                backend = self.cache.backend_name(),
                "failed to cache introspection result"
            );
        }

        Ok(record)
    }

    /// Claims of the token's owner. Never cached.
    pub async fn user_info(&self, token: &str) -> Result<UserInfo, VerifierError> {
        Ok(self.endpoints.user_info(token).await?)
    }

    /// Verify an identity token against the first published key and check that this client is
    /// its first audience.
    pub async fn validate_id_token(&self, token: &str) -> Result<IdentityClaims, VerifierError> {
        let claims = self.signatures.verify(token).await?;

        if claims.audience.first().map(String::as_str) != Some(self.config.client_id()) {
            return Err(VerifierError::AudienceMismatch);
        }

        Ok(claims)
    }

    /// Revoke a token at the authorization server, then drop it from the cache.
    ///
    /// The cache entry is dropped whatever the remote outcome: a forgotten entry only costs
    /// one extra introspection, a stale one would keep a revoked token alive.
    pub async fn revoke(&self, token: &str) -> Result<(), VerifierError> {
        let outcome = self.endpoints.revoke(token).await;
        self.forget(token).await;

        if let Err(err) = &outcome {
            warn!(error = %err, "token revocation failed");
        }
        Ok(outcome?)
    }

    async fn forget(&self, token: &str) {
        if let Err(err) = self.cache.remove(token).await {
            warn!(
                error = %err,
                backend = self.cache.backend_name(),
                "failed to drop token from introspection cache"
            );
        }
    }
}
