//! Bearer token introspection → AuthCtx in request extensions.
//!
//! - `Authorization: Bearer <token>` (scheme is case-insensitive)
//! - the token is introspected through the shared `Verifier` (cache first)
//! - on success `AuthCtx` is inserted for the handlers; otherwise the request is answered
//!   with 401 (token problem) or 502 (authorization server problem)
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;
use crate::state::AppState;

/// Put bearer authentication in front of every route of `router`.
///
/// ```ignore
/// let me = Router::new().route("/me", get(me));
/// let me = middleware::auth::access::apply(me, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

/// Token part of an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized("missing bearer token"))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or(AppError::Unauthorized("malformed authorization header"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::Unauthorized("unsupported authorization scheme"));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::Unauthorized("missing bearer token"));
    }
    Ok(token)
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())?;

    let record = match state.verifier.introspect(token).await {
        Ok(record) => record,
        Err(err) => {
            tracing::warn!(error = %err, "access token introspection failed");
            return Err(err.into());
        }
    };

    req.extensions_mut().insert(AuthCtx::from_record(&record));

    Ok(next.run(req).await)
}
