//! Authentication error types
//!
//! Errors produced by the auth middleware while resolving the caller's
//! identity. These map straight to HTTP responses so the middleware can
//! return them with `?`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Error, Debug)]
pub enum AuthError {
    /// No Authorization header on a request that requires one
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    /// Authorization header present but not `Bearer <token>`
    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    /// Token did not match any configured secret
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Auth was required but the server has no usable auth configuration
    #[error("Auth configuration error: {0}")]
    ConfigError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({"error": self.to_string()}));
        (status, body).into_response()
    }
}
