//! Identity token signature verification against the published key set.
//!
//! Only the first key of the set is used; `kid` based selection is not supported.
use jsonwebtoken::{
    DecodingKey, Validation, decode, decode_header,
    errors::{Error as JwtError, ErrorKind},
    jwk::Jwk,
};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::services::oauth::endpoint::{EndpointClient, EndpointError};
use crate::services::oauth::types::{IdentityClaims, KeySetDocument};

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("failed to fetch key set: {0}")]
    KeySetFetch(#[source] EndpointError),
    #[error("key set is empty")]
    EmptyKeySet,
    #[error("unusable verification key: {0}")]
    InvalidKey(String),
    #[error("identity token signature is invalid: {0}")]
    SignatureInvalid(#[source] JwtError),
    #[error("malformed identity token: {0}")]
    Malformed(#[source] JwtError),
}

impl SignatureError {
    /// The identity token itself is bad, as opposed to the key set being unavailable or
    /// unusable.
    pub fn is_token_fault(&self) -> bool {
        matches!(self, Self::SignatureInvalid(_) | Self::Malformed(_))
    }
}

impl From<JwtError> for SignatureError {
    fn from(e: JwtError) -> Self {
        match e.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Self::Malformed(e),
            _ => Self::SignatureInvalid(e),
        }
    }
}

struct CachedKeySet {
    document: KeySetDocument,
    fetched_at: Instant,
}

pub struct SignatureValidator {
    endpoints: EndpointClient,
    leeway_seconds: u64,
    // `None`: fetch the key set on every call.
    key_set_ttl: Option<Duration>,
    cached: RwLock<Option<CachedKeySet>>,
}

impl std::fmt::Debug for SignatureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureValidator")
            .field("leeway_seconds", &self.leeway_seconds)
            .field("key_set_ttl", &self.key_set_ttl)
            .finish_non_exhaustive()
    }
}

impl SignatureValidator {
    pub fn new(
        endpoints: EndpointClient,
        leeway_seconds: u64,
        key_set_ttl: Option<Duration>,
    ) -> Self {
        Self {
            endpoints,
            leeway_seconds,
            key_set_ttl,
            cached: RwLock::new(None),
        }
    }

    async fn key_set(&self) -> Result<KeySetDocument, SignatureError> {
        if let Some(ttl) = self.key_set_ttl {
            let cached = self.cached.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = cached.as_ref().filter(|c| c.fetched_at.elapsed() < ttl) {
                debug!("using cached key set");
                return Ok(entry.document.clone());
            }
        }

        let document = self
            .endpoints
            .fetch_key_set()
            .await
            .map_err(SignatureError::KeySetFetch)?;

        if self.key_set_ttl.is_some() {
            let mut cached = self.cached.write().unwrap_or_else(PoisonError::into_inner);
            *cached = Some(CachedKeySet {
                document: document.clone(),
                fetched_at: Instant::now(),
            });
        }

        Ok(document)
    }

    /// Decoding key built from the first published key.
    pub async fn first_key(&self) -> Result<DecodingKey, SignatureError> {
        let document = self.key_set().await?;
        let first = document.keys.into_iter().next().ok_or(SignatureError::EmptyKeySet)?;

        let jwk: Jwk = serde_json::from_value(first).map_err(|e| {
            warn!(error = %e, "first key of the key set is not a supported JWK");
            SignatureError::InvalidKey(e.to_string())
        })?;

        DecodingKey::from_jwk(&jwk).map_err(|e| SignatureError::InvalidKey(e.to_string()))
    }

    /// Verify a compact-serialized token and decode its claims.
    ///
    /// Checks the signature and `exp` (with leeway). Audience is left to the caller.
    pub async fn verify(&self, token: &str) -> Result<IdentityClaims, SignatureError> {
        let header = decode_header(token)?;
        let key = self.first_key().await?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.leeway_seconds;
        validation.validate_aud = false;

        let data = decode::<IdentityClaims>(token, &key, &validation)?;
        Ok(data.claims)
    }
}
