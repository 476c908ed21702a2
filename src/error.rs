/*
 * Responsibility
 * - HTTP-facing error type (AppError)
 * - IntoResponse (status + JSON error body)
 * - Map verifier failures onto 401 / 502 / 500
 */
use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::oauth::VerifierError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),
    #[error("authorization server unavailable")]
    BadGateway,
    #[error("internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Unauthorized(reason) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", reason.to_string())
            }
            AppError::BadGateway => (
                StatusCode::BAD_GATEWAY,
                "BAD_GATEWAY",
                "authorization server unavailable".into(),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "internal server error".into(),
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        if status == StatusCode::UNAUTHORIZED {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], Json(body)).into_response();
        }
        (status, Json(body)).into_response()
    }
}

impl From<VerifierError> for AppError {
    fn from(e: VerifierError) -> Self {
        match e {
            VerifierError::TokenInactive => AppError::Unauthorized("token is not active"),
            VerifierError::ForeignClient => {
                AppError::Unauthorized("token was issued to another client")
            }
            e if e.is_token_rejection() => AppError::Unauthorized("invalid token"),
            e if e.is_upstream_failure() => AppError::BadGateway,
            _ => AppError::Internal,
        }
    }
}
