/*
 * Responsibility
 * - Load settings from the environment (.env via dotenvy)
 * - Validate them (missing/invalid values fail startup)
 * - Assemble VerifierConfig / CacheConfig for the service factories
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::services::cache::{
    CacheConfig, MemoryCacheConfig,
    memory::{DEFAULT_GETS_PER_PROMOTE, DEFAULT_ITEMS_TO_PRUNE, DEFAULT_MAX_SIZE},
};
use crate::services::oauth::{
    IntrospectionAuth, VerifierConfig,
    config::{DEFAULT_CACHE_KEY_PREFIX, DEFAULT_HTTP_TIMEOUT, DEFAULT_ID_TOKEN_LEEWAY_SECONDS},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or("development").to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub verifier: VerifierConfig,
    pub cache: CacheConfig,
}

// Unset and empty are treated alike.
fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<String, ConfigError> {
    non_empty(lookup(key)).ok_or(ConfigError::Missing(key))
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    non_empty(lookup(key))
        .map(|v| v.parse::<T>().map_err(|_| ConfigError::Invalid(key)))
        .transpose()
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    Ok(parsed::<u64>(lookup, key)?.map(Duration::from_secs))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port: u16 = parsed(&lookup, "PORT")?.unwrap_or(3000);
        let addr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(lookup("APP_ENV").as_deref());

        let verifier = Self::verifier_from(&lookup)?;
        let cache = Self::cache_from(&lookup)?;

        Ok(Self {
            addr,
            app_env,
            verifier,
            cache,
        })
    }

    fn verifier_from(
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Result<VerifierConfig, ConfigError> {
        let issuer = required(lookup, "AUTHONE_ISSUER")?;
        let client_id = required(lookup, "AUTHONE_CLIENT_ID")?;
        let client_secret = required(lookup, "AUTHONE_CLIENT_SECRET")?;

        let scopes = non_empty(lookup("AUTHONE_SCOPES"))
            .map(|v| {
                v.split([',', ' '])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let introspection_auth = parsed::<IntrospectionAuth>(lookup, "AUTHONE_INTROSPECTION_AUTH")?
            .unwrap_or_default();

        // 0 disables the client-side timeout
        let http_timeout = match seconds(lookup, "AUTHONE_HTTP_TIMEOUT_SECONDS")? {
            Some(Duration::ZERO) => None,
            Some(timeout) => Some(timeout),
            None => Some(DEFAULT_HTTP_TIMEOUT),
        };

        let key_set_ttl = seconds(lookup, "AUTHONE_KEY_SET_TTL_SECONDS")?.filter(|d| !d.is_zero());

        let leeway = parsed(lookup, "AUTHONE_ID_TOKEN_LEEWAY_SECONDS")?
            .unwrap_or(DEFAULT_ID_TOKEN_LEEWAY_SECONDS);

        let prefix = non_empty(lookup("CACHE_KEY_PREFIX"))
            .unwrap_or_else(|| DEFAULT_CACHE_KEY_PREFIX.to_string());

        let mut config = VerifierConfig::new(issuer, client_id, client_secret)?
            .with_scopes(scopes)
            .with_introspection_auth(introspection_auth)
            .with_http_timeout(http_timeout)
            .with_key_set_ttl(key_set_ttl)
            .with_id_token_leeway(leeway)
            .with_cache_key_prefix(prefix);

        if let Some(redirect_url) = non_empty(lookup("AUTHONE_REDIRECT_URL")) {
            url::Url::parse(&redirect_url)
                .map_err(|_| ConfigError::Invalid("AUTHONE_REDIRECT_URL"))?;
            config = config.with_redirect_url(redirect_url);
        }

        Ok(config)
    }

    fn cache_from(lookup: &impl Fn(&str) -> Option<String>) -> Result<CacheConfig, ConfigError> {
        let backend = non_empty(lookup("CACHE_BACKEND"))
            .unwrap_or_else(|| "memory".to_string())
            .to_ascii_lowercase();

        let max_size = parsed(lookup, "CACHE_MAX_SIZE")?.unwrap_or(DEFAULT_MAX_SIZE);
        if max_size == 0 {
            return Err(ConfigError::Invalid("CACHE_MAX_SIZE"));
        }

        match backend.as_str() {
            "memory" => {
                let items_to_prune =
                    parsed(lookup, "CACHE_ITEMS_TO_PRUNE")?.unwrap_or(DEFAULT_ITEMS_TO_PRUNE);
                let gets_per_promote =
                    parsed(lookup, "CACHE_GETS_PER_PROMOTE")?.unwrap_or(DEFAULT_GETS_PER_PROMOTE);
                let sweep_interval =
                    seconds(lookup, "CACHE_SWEEP_INTERVAL_SECONDS")?.filter(|d| !d.is_zero());

                Ok(CacheConfig::Memory {
                    config: MemoryCacheConfig {
                        max_size,
                        items_to_prune,
                        gets_per_promote,
                    },
                    sweep_interval,
                })
            }
            "lru" => Ok(CacheConfig::Lru { max_size }),
            "valkey" | "redis" => Ok(CacheConfig::Valkey {
                url: required(lookup, "VALKEY_URL")?,
            }),
            _ => Err(ConfigError::Invalid("CACHE_BACKEND")),
        }
    }
}
