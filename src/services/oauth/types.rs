//! Wire types returned by the authorization server.
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use oauth2::{
    ExtraTokenFields, StandardTokenResponse, TokenResponse as _, basic::BasicTokenType,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

// `aud` may be a single string or an array of strings.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(aud)) => vec![aud],
        Some(OneOrMany::Many(aud)) => aud,
        None => Vec::new(),
    })
}

/// Result of token introspection (RFC 7662 response shape).
///
/// The same JSON shape is what gets written to the cache, so a cached record reads back
/// exactly as it came from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrospectionRecord {
    #[serde(default)]
    pub active: bool,
    #[serde(
        rename = "aud",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub audience: Vec<String>,
    #[serde(default)]
    pub client_id: String,
    // Unix seconds.
    #[serde(rename = "exp", default)]
    pub expires_at: i64,
    #[serde(rename = "iat", default)]
    pub issued_at: i64,
    #[serde(rename = "iss", default)]
    pub issuer: String,
    #[serde(rename = "nbf", default)]
    pub not_before: i64,
    // Space-separated.
    #[serde(default)]
    pub scope: String,
    #[serde(rename = "sub", default)]
    pub subject: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    // Arbitrary session data attached by the server.
    #[serde(rename = "ext", default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Map<String, Value>>,
}

impl IntrospectionRecord {
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.split_whitespace()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().any(|s| s == scope)
    }

    /// Time left until `exp`, as seen at `now` (unix seconds). Zero once passed.
    pub fn remaining_ttl(&self, now: i64) -> Duration {
        u64::try_from(self.expires_at.saturating_sub(now))
            .map(Duration::from_secs)
            .unwrap_or(Duration::ZERO)
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires_at, 0)
    }
}

/// Claims of a verified identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    #[serde(rename = "sub", default)]
    pub subject: String,
    #[serde(rename = "aud", default, deserialize_with = "one_or_many")]
    pub audience: Vec<String>,
    #[serde(rename = "iss", default)]
    pub issuer: String,
    #[serde(rename = "exp", default)]
    pub expires_at: i64,
    #[serde(rename = "iat", default)]
    pub issued_at: i64,
    #[serde(default)]
    pub nonce: String,
    #[serde(rename = "at_hash", default)]
    pub access_token_hash: String,
    #[serde(rename = "jti", default)]
    pub jwt_id: String,
    #[serde(default)]
    pub auth_time: i64,
    #[serde(rename = "rat", default)]
    pub requested_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(rename = "sub")]
    pub subject: String,
}

/// Published key set document (`/.well-known/jwks.json`).
///
/// Keys are kept as raw JSON: only the first one is ever parsed, so an unsupported key
/// further down the list does not break validation.
#[derive(Debug, Clone, Deserialize)]
pub struct KeySetDocument {
    #[serde(default)]
    pub keys: Vec<Value>,
}

/// Token endpoint fields beyond the standard ones (`id_token`, provider extensions).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenFields {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ExtraTokenFields for TokenFields {}

/// Decoded token endpoint response of an authorization code exchange.
pub type CodeTokenResponse = StandardTokenResponse<TokenFields, BasicTokenType>;

/// Tokens obtained from an authorization code exchange.
///
/// `raw` keeps the whole JSON object so provider-specific fields (`id_token`, `scope`, ...)
/// stay reachable through [`Token::extra`].
#[derive(Clone)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub expiry: Option<DateTime<Utc>>,
    raw: Map<String, Value>,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print token material
        f.debug_struct("Token")
            .field("token_type", &self.token_type)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl Token {
    /// Returns `None` when `access_token` is empty.
    pub fn from_response(response: &CodeTokenResponse, now: DateTime<Utc>) -> Option<Self> {
        let access_token = response.access_token().secret();
        if access_token.is_empty() {
            return None;
        }

        let raw = match serde_json::to_value(response) {
            Ok(Value::Object(raw)) => raw,
            _ => Map::new(),
        };

        let token_type = raw
            .get("token_type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let refresh_token = response
            .refresh_token()
            .map(|t| t.secret().clone())
            .filter(|t| !t.is_empty());

        let expires_in = response
            .expires_in()
            .and_then(|d| i64::try_from(d.as_secs()).ok());

        let expiry = expires_in
            .filter(|secs| *secs > 0)
            .and_then(|secs| now.checked_add_signed(ChronoDuration::seconds(secs)));

        Some(Self {
            access_token: access_token.clone(),
            token_type,
            refresh_token,
            expires_in,
            expiry,
            raw,
        })
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    /// Identity token embedded in the response, if the `openid` scope was granted.
    pub fn id_token(&self) -> Option<&str> {
        self.extra("id_token").and_then(Value::as_str)
    }

    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && self.expiry.is_none_or(|expiry| expiry > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn introspection_record_decodes_full_response() {
        let record: IntrospectionRecord = serde_json::from_value(json!({
            "active": true,
            "aud": ["api", "web"],
            "client_id": "CLIENT_ID",
            "exp": 1_900_000_000,
            "iat": 1_800_000_000,
            "iss": "https://auth.example.com",
            "nbf": 1_800_000_000,
            "scope": "openid offline",
            "sub": "user-1",
            "token_type": "access_token",
            "username": "jdoe",
            "ext": {"tenant": "t1"}
        }))
        .unwrap();

        assert!(record.active);
        assert_eq!(record.audience, vec!["api", "web"]);
        assert_eq!(record.subject, "user-1");
        assert!(record.has_scope("offline"));
        assert!(!record.has_scope("admin"));
        assert_eq!(record.extra.unwrap()["tenant"], "t1");
    }

    #[test]
    fn introspection_record_accepts_minimal_and_string_audience() {
        let record: IntrospectionRecord =
            serde_json::from_value(json!({"active": true, "client_id": "CLIENT_ID", "aud": "api"}))
                .unwrap();
        assert_eq!(record.audience, vec!["api"]);
        assert_eq!(record.expires_at, 0);

        let record: IntrospectionRecord = serde_json::from_value(json!({})).unwrap();
        assert!(!record.active);
        assert!(record.audience.is_empty());
    }

    #[test]
    fn cached_form_reads_back_identically() {
        let record: IntrospectionRecord = serde_json::from_value(json!({
            "active": true,
            "aud": ["api"],
            "client_id": "CLIENT_ID",
            "exp": 1_900_000_000,
            "scope": "openid",
            "sub": "user-1",
            "token_type": "access_token"
        }))
        .unwrap();

        let stored = serde_json::to_string(&record).unwrap();
        let restored: IntrospectionRecord = serde_json::from_str(&stored).unwrap();
        assert_eq!(restored, record);
    }

    #[test]
    fn remaining_ttl_saturates_at_zero() {
        let record = IntrospectionRecord {
            expires_at: 1_000,
            ..serde_json::from_value::<IntrospectionRecord>(json!({})).unwrap()
        };

        assert_eq!(record.remaining_ttl(990), Duration::from_secs(10));
        assert_eq!(record.remaining_ttl(1_000), Duration::ZERO);
        assert_eq!(record.remaining_ttl(5_000), Duration::ZERO);
    }

    #[test]
    fn identity_claims_decode_standard_fields() {
        let claims: IdentityClaims = serde_json::from_value(json!({
            "sub": "user-1",
            "aud": "CLIENT_ID",
            "iss": "https://auth.example.com",
            "exp": 1_900_000_000,
            "iat": 1_800_000_000,
            "nonce": "n-0S6",
            "at_hash": "77QmUPtjPfzWtF2AnpK9RQ",
            "jti": "id-1"
        }))
        .unwrap();

        assert_eq!(claims.audience, vec!["CLIENT_ID"]);
        assert_eq!(claims.access_token_hash, "77QmUPtjPfzWtF2AnpK9RQ");
        assert_eq!(claims.jwt_id, "id-1");
    }

    fn token_response(value: Value) -> CodeTokenResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn token_keeps_extra_fields() {
        let now = Utc::now();
        let response = token_response(json!({
            "access_token": "abc",
            "token_type": "bearer",
            "expires_in": 86400,
            "scope": "user",
            "id_token": "h.p.s",
            "provider_field": {"nested": true}
        }));
        let token = Token::from_response(&response, now).unwrap();

        assert_eq!(token.access_token, "abc");
        assert_eq!(token.token_type, "bearer");
        assert_eq!(token.expires_in, Some(86400));
        assert_eq!(token.extra("scope"), Some(&json!("user")));
        assert_eq!(token.extra("provider_field"), Some(&json!({"nested": true})));
        assert_eq!(token.id_token(), Some("h.p.s"));
        assert!(token.is_valid_at(now));
        assert!(!token.is_valid_at(now + ChronoDuration::seconds(86401)));
    }

    #[test]
    fn token_without_expiry_never_expires() {
        let response = token_response(json!({"access_token": "abc", "token_type": "Bearer"}));
        let token = Token::from_response(&response, Utc::now()).unwrap();

        assert_eq!(token.expires_in, None);
        assert!(token.is_valid_at(Utc::now() + ChronoDuration::days(3650)));
    }

    #[test]
    fn token_requires_access_token() {
        let now = Utc::now();
        let empty = token_response(json!({"access_token": "", "token_type": "bearer"}));
        assert!(Token::from_response(&empty, now).is_none());

        assert!(serde_json::from_value::<CodeTokenResponse>(json!({"access_token": 42})).is_err());
    }

    #[test]
    fn token_debug_hides_secrets() {
        let response = token_response(json!({
            "access_token": "secret-at",
            "token_type": "bearer",
            "refresh_token": "secret-rt"
        }));
        let token = Token::from_response(&response, Utc::now()).unwrap();

        let rendered = format!("{token:?}");
        assert!(!rendered.contains("secret-at"));
        assert!(!rendered.contains("secret-rt"));
        assert_eq!(token.refresh_token.as_deref(), Some("secret-rt"));
    }
}
