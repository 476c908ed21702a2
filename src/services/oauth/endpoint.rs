//! HTTP calls to the authorization server.
//!
//! The authorization code half (authorization URL, code exchange) goes through an `oauth2`
//! client; introspection, user info, revocation and the key set are plain `reqwest` calls.
//! Every response is read up to `MAX_RESPONSE_BYTES` and anything outside 2xx is a protocol
//! error. No caching, no retries.
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    HttpRequest, HttpResponse, RedirectUrl, RequestTokenError, Scope, TokenUrl,
    basic::{BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse},
    StandardRevocableToken,
};
use reqwest::{
    RequestBuilder, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION, HeaderMap},
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use url::form_urlencoded;

use crate::config::ConfigError;
use crate::services::oauth::config::{IntrospectionAuth, VerifierConfig};
use crate::services::oauth::types::{
    CodeTokenResponse, IntrospectionRecord, KeySetDocument, Token, UserInfo,
};

/// Responses larger than this are refused.
pub const MAX_RESPONSE_BYTES: usize = 1 << 20;

const TOKEN: &str = "token";
const INTROSPECT: &str = "introspect";
const USER_INFO: &str = "userinfo";
const REVOKE: &str = "revoke";
const KEY_SET: &str = "jwks";

type CodeClient = oauth2::Client<
    BasicErrorResponse,
    CodeTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("{endpoint} request failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} endpoint returned {status}: {body}")]
    Protocol {
        endpoint: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("cannot decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{endpoint} response exceeds {limit} bytes")]
    BodyTooLarge { endpoint: &'static str, limit: usize },
    #[error("token response is missing access_token")]
    MissingAccessToken,
    #[error("unexpected {endpoint} response: {message}")]
    Unexpected {
        endpoint: &'static str,
        message: String,
    },
}

impl EndpointError {
    /// HTTP status of a protocol error.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The server refused the presented token itself.
    ///
    /// Only the user-info endpoint authenticates with the caller's token. A 4xx from any
    /// other endpoint concerns this client's own request or credentials.
    pub fn is_token_refusal(&self) -> bool {
        matches!(
            self,
            Self::Protocol { endpoint: USER_INFO, status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { source, .. } if source.is_timeout())
    }
}

fn decode<T: DeserializeOwned>(endpoint: &'static str, body: &[u8]) -> Result<T, EndpointError> {
    serde_json::from_slice(body).map_err(|source| EndpointError::Decode { endpoint, source })
}

async fn read_limited(
    endpoint: &'static str,
    mut response: Response,
) -> Result<Vec<u8>, EndpointError> {
    let too_large = EndpointError::BodyTooLarge {
        endpoint,
        limit: MAX_RESPONSE_BYTES,
    };

    if response
        .content_length()
        .is_some_and(|len| len > MAX_RESPONSE_BYTES as u64)
    {
        return Err(too_large);
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|source| EndpointError::Transport { endpoint, source })?
    {
        if body.len() + chunk.len() > MAX_RESPONSE_BYTES {
            return Err(too_large);
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

fn code_client(config: &VerifierConfig) -> Result<CodeClient, ConfigError> {
    let endpoints = config.endpoints();
    let auth_url = AuthUrl::new(endpoints.authorize.clone())
        .map_err(|_| ConfigError::Invalid("AUTHONE_ISSUER"))?;
    let token_url = TokenUrl::new(endpoints.token.clone())
        .map_err(|_| ConfigError::Invalid("AUTHONE_ISSUER"))?;

    let mut client: CodeClient = oauth2::Client::new(ClientId::new(config.client_id().into()))
        .set_auth_uri(auth_url)
        .set_token_uri(token_url);

    // Without a secret the client id goes into the form body instead of a Basic header.
    if !config.client_secret().is_empty() {
        client = client.set_client_secret(ClientSecret::new(config.client_secret().into()));
    }
    if let Some(redirect_url) = config.redirect_url() {
        let redirect_url = RedirectUrl::new(redirect_url.into())
            .map_err(|_| ConfigError::Invalid("AUTHONE_REDIRECT_URL"))?;
        client = client.set_redirect_uri(redirect_url);
    }

    Ok(client)
}

fn token_request_error(err: RequestTokenError<EndpointError, BasicErrorResponse>) -> EndpointError {
    match err {
        RequestTokenError::Request(err) => err,
        RequestTokenError::Parse(err, body) => {
            let missing_access_token = serde_json::from_slice::<Map<String, Value>>(&body)
                .is_ok_and(|fields| !fields.get("access_token").is_some_and(Value::is_string));
            if missing_access_token {
                EndpointError::MissingAccessToken
            } else {
                EndpointError::Decode {
                    endpoint: TOKEN,
                    source: err.into_inner(),
                }
            }
        }
        RequestTokenError::ServerResponse(err) => EndpointError::Unexpected {
            endpoint: TOKEN,
            message: err.to_string(),
        },
        RequestTokenError::Other(message) => EndpointError::Unexpected {
            endpoint: TOKEN,
            message,
        },
    }
}

/// Client for the token, introspection, user-info, revocation and key-set endpoints.
///
/// Cheap to clone (`reqwest::Client` and the config are both shared).
#[derive(Clone)]
pub struct EndpointClient {
    http: reqwest::Client,
    config: Arc<VerifierConfig>,
    code_client: CodeClient,
}

impl std::fmt::Debug for EndpointClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointClient")
            .field("config", &self.config)
            .field("http", &"<reqwest::Client>")
            .finish_non_exhaustive()
    }
}

impl EndpointClient {
    pub fn new(http: reqwest::Client, config: Arc<VerifierConfig>) -> Result<Self, ConfigError> {
        let code_client = code_client(&config)?;
        Ok(Self {
            http,
            config,
            code_client,
        })
    }

    pub fn build_http_client(config: &VerifierConfig) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }

    /// `Authorization: Basic` value for introspection with client credentials.
    ///
    /// Id and secret are form-encoded before joining (RFC 6749 section 2.3.1).
    fn basic_credentials(&self) -> String {
        let encode = |s: &str| form_urlencoded::byte_serialize(s.as_bytes()).collect::<String>();
        let id = encode(self.config.client_id());
        let secret = encode(self.config.client_secret());
        format!("Basic {}", STANDARD.encode(format!("{id}:{secret}")))
    }

    async fn execute(
        &self,
        endpoint: &'static str,
        request: reqwest::Request,
    ) -> Result<(StatusCode, HeaderMap, Vec<u8>), EndpointError> {
        debug!(endpoint, "calling authorization server");

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|source| EndpointError::Transport { endpoint, source })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = read_limited(endpoint, response).await?;

        if !status.is_success() {
            debug!(endpoint, %status, "authorization server rejected request");
            return Err(EndpointError::Protocol {
                endpoint,
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok((status, headers, body))
    }

    async fn send(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<Vec<u8>, EndpointError> {
        let request = request
            .header(ACCEPT, "application/json")
            .build()
            .map_err(|source| EndpointError::Transport { endpoint, source })?;

        let (_, _, body) = self.execute(endpoint, request).await?;
        Ok(body)
    }

    /// Transport handed to the `oauth2` client, with the limits of the other endpoints.
    async fn send_oauth2(&self, request: HttpRequest) -> Result<HttpResponse, EndpointError> {
        let request = reqwest::Request::try_from(request)
            .map_err(|source| EndpointError::Transport { endpoint: TOKEN, source })?;

        let (status, headers, body) = self.execute(TOKEN, request).await?;

        let mut response = HttpResponse::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    /// URL of the first step of the authorization code flow.
    ///
    /// Query keys are sorted; `redirect_uri`, `scope` and `state` are left out when empty.
    /// `extra` pairs are added on top (a repeated key gets several values).
    pub fn authorize_url(&self, state: &str, extra: &[(&str, &str)]) -> String {
        let scopes = self.config.scopes().iter().cloned().map(Scope::new);
        let mut request = self
            .code_client
            .authorize_url(|| CsrfToken::new(state.to_string()))
            .add_scopes(scopes);
        for &(name, value) in extra {
            request = request.add_extra_param(name, value);
        }
        let (mut url, _) = request.url();

        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .into_owned()
            .filter(|(name, value)| !(name == "state" && value.is_empty()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        url.query_pairs_mut().clear().extend_pairs(pairs);

        url.into()
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<Token, EndpointError> {
        let http = |request: HttpRequest| self.send_oauth2(request);

        let response = self
            .code_client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&http)
            .await
            .map_err(token_request_error)?;

        Token::from_response(&response, Utc::now()).ok_or(EndpointError::MissingAccessToken)
    }

    pub async fn introspect(&self, token: &str) -> Result<IntrospectionRecord, EndpointError> {
        let mut form = vec![("token", token)];
        let mut request = self.http.post(&self.config.endpoints().introspect);

        match self.config.introspection_auth {
            IntrospectionAuth::None => {}
            IntrospectionAuth::FormFields => {
                form.push(("client_id", self.config.client_id()));
                form.push(("secret", self.config.client_secret()));
            }
            IntrospectionAuth::Basic => {
                request = request.header(AUTHORIZATION, self.basic_credentials());
            }
        }

        let body = self.send(INTROSPECT, request.form(&form)).await?;
        decode(INTROSPECT, &body)
    }

    pub async fn user_info(&self, token: &str) -> Result<UserInfo, EndpointError> {
        let request = self
            .http
            .get(&self.config.endpoints().user_info)
            .bearer_auth(token);

        let body = self.send(USER_INFO, request).await?;
        decode(USER_INFO, &body)
    }

    /// Revoke an access or refresh token. The response body is ignored.
    pub async fn revoke(&self, token: &str) -> Result<(), EndpointError> {
        let request = self
            .http
            .post(&self.config.endpoints().revoke)
            .form(&[("token", token)]);

        self.send(REVOKE, request).await?;
        Ok(())
    }

    pub async fn fetch_key_set(&self) -> Result<KeySetDocument, EndpointError> {
        let request = self.http.get(&self.config.endpoints().key_set);

        let body = self.send(KEY_SET, request).await?;
        decode(KEY_SET, &body)
    }
}
