/*
 * Responsibility
 * - URL layout of v1
 * - /health is open, everything else goes through the bearer middleware
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::{health::health, me::me};
use crate::middleware::auth::access;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = access::apply(Router::new().route("/me", get(me)), state);

    Router::new()
        .route("/health", get(health))
        .merge(protected)
}
