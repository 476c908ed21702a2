//! Relying-party configuration.
//!
//! Every endpoint URL is derived once from the issuer base URL when the configuration is
//! created. The verifier keeps it behind an `Arc` and never mutates it.
use std::time::Duration;

use url::form_urlencoded;

use crate::config::ConfigError;

pub const DEFAULT_CACHE_KEY_PREFIX: &str = "a_t_s";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ID_TOKEN_LEEWAY_SECONDS: u64 = 60;

/// Authorization server endpoints, all under the issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub authorize: String,
    pub token: String,
    pub introspect: String,
    pub user_info: String,
    pub revoke: String,
    pub key_set: String,
    pub logout: String,
}

impl Endpoints {
    pub fn from_issuer(issuer: &str) -> Self {
        Self {
            authorize: format!("{issuer}/oauth2/auth"),
            token: format!("{issuer}/oauth2/token"),
            introspect: format!("{issuer}/oauth2/introspect"),
            user_info: format!("{issuer}/userinfo"),
            revoke: format!("{issuer}/oauth2/revoke"),
            key_set: format!("{issuer}/.well-known/jwks.json"),
            logout: format!("{issuer}/oauth2/logout"),
        }
    }
}

/// How the client authenticates against the introspection endpoint.
///
/// Deployments differ: some servers accept anonymous introspection, others want the client
/// credentials in the form body, others in a Basic header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntrospectionAuth {
    None,
    // `client_id` + `secret` form fields.
    #[default]
    FormFields,
    Basic,
}

impl std::str::FromStr for IntrospectionAuth {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "form" | "form_fields" => Ok(Self::FormFields),
            "basic" => Ok(Self::Basic),
            _ => Err(ConfigError::Invalid("AUTHONE_INTROSPECTION_AUTH")),
        }
    }
}

#[derive(Clone)]
pub struct VerifierConfig {
    issuer: String,
    client_id: String,
    client_secret: String,
    redirect_url: Option<String>,
    scopes: Vec<String>,
    endpoints: Endpoints,

    pub introspection_auth: IntrospectionAuth,
    // Per-request timeout applied by the HTTP client.
    pub http_timeout: Option<Duration>,
    // `None` refetches the key set on every identity-token validation.
    pub key_set_ttl: Option<Duration>,
    pub id_token_leeway_seconds: u64,
    pub cache_key_prefix: String,
}

impl std::fmt::Debug for VerifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print the client secret
        f.debug_struct("VerifierConfig")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("redirect_url", &self.redirect_url)
            .field("scopes", &self.scopes)
            .field("introspection_auth", &self.introspection_auth)
            .field("http_timeout", &self.http_timeout)
            .field("key_set_ttl", &self.key_set_ttl)
            .finish_non_exhaustive()
    }
}

impl VerifierConfig {
    /// `issuer` is the authorization server base URL, e.g. `https://auth.example.com`.
    pub fn new(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let issuer = issuer.into().trim_end_matches('/').to_string();
        url::Url::parse(&issuer).map_err(|_| ConfigError::Invalid("AUTHONE_ISSUER"))?;

        let client_id = client_id.into();
        if client_id.trim().is_empty() {
            return Err(ConfigError::Missing("AUTHONE_CLIENT_ID"));
        }

        Ok(Self {
            endpoints: Endpoints::from_issuer(&issuer),
            issuer,
            client_id,
            client_secret: client_secret.into(),
            redirect_url: None,
            scopes: Vec::new(),
            introspection_auth: IntrospectionAuth::default(),
            http_timeout: Some(DEFAULT_HTTP_TIMEOUT),
            key_set_ttl: None,
            id_token_leeway_seconds: DEFAULT_ID_TOKEN_LEEWAY_SECONDS,
            cache_key_prefix: DEFAULT_CACHE_KEY_PREFIX.to_string(),
        })
    }

    pub fn with_redirect_url(mut self, redirect_url: impl Into<String>) -> Self {
        let redirect_url = redirect_url.into();
        self.redirect_url = (!redirect_url.is_empty()).then_some(redirect_url);
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_introspection_auth(mut self, auth: IntrospectionAuth) -> Self {
        self.introspection_auth = auth;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_key_set_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.key_set_ttl = ttl;
        self
    }

    pub fn with_id_token_leeway(mut self, seconds: u64) -> Self {
        self.id_token_leeway_seconds = seconds;
        self
    }

    pub fn with_cache_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_key_prefix = prefix.into();
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_url.as_deref()
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// URL ending the user's session at the authorization server, which then sends the
    /// browser to `redirect`. An empty `redirect` leaves the query out.
    pub fn logout_url(&self, redirect: &str) -> String {
        if redirect.is_empty() {
            return self.endpoints.logout.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("redirect_uri", redirect)
            .finish();
        format!("{}?{}", self.endpoints.logout, query)
    }
}
