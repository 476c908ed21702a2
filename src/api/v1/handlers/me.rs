/*
 * Responsibility
 * - GET /me (behind the bearer middleware)
 * - Echo the authenticated context back to the caller
 */
use axum::Json;

use crate::api::v1::extractors::{AuthCtx, AuthCtxExtractor};

pub async fn me(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<AuthCtx> {
    Json(ctx)
}
