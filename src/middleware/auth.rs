use crate::auth::{Auth, match_api_secret_id};
use crate::errors::auth_error::AuthError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Extract the bearer token from the Authorization header.
fn extract_token(request: &Request) -> Result<String, AuthError> {
    let Some(auth_header) = request.headers().get("authorization") else {
        return Err(AuthError::MissingAuthHeader);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) => Ok(token.to_string()),
        None => Err(AuthError::InvalidAuthHeader),
    }
}

/// Authentication middleware that validates bearer tokens.
///
/// The middleware:
/// 1. Extracts the token from the Authorization header
/// 2. Compares it against the configured API secrets in constant time
/// 3. Inserts an [`Auth`] into request extensions on success
/// 4. Returns 401 if validation fails
///
/// With authentication disabled an empty `Auth` is inserted instead, so
/// handlers that merely read the extension still work; handlers that
/// need an account identity reject the empty context themselves.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if !state.config.auth_required {
        tracing::debug!("Authentication disabled, inserting empty Auth context");
        request.extensions_mut().insert(Auth::empty());
        return Ok(next.run(request).await);
    }

    let request_method = request.method().to_string();
    let request_path = request.uri().path().to_string();

    let token = extract_token(&request)?;

    if !state.config.has_api_secret_auth() {
        return Err(AuthError::ConfigError(
            "Authentication required but no API secrets configured".to_string(),
        ));
    }

    match match_api_secret_id(&token, &state.config.auth_api_secrets) {
        Some(secret_id) => {
            tracing::debug!(
                method = %request_method,
                path = %request_path,
                auth_id = %secret_id,
                "API secret authentication successful"
            );
            request.extensions_mut().insert(Auth::new(secret_id));
            Ok(next.run(request).await)
        }
        None => {
            tracing::warn!(
                method = %request_method,
                path = %request_path,
                "API secret authentication failed: token mismatch"
            );
            Err(AuthError::Unauthorized("Invalid API secret".to_string()))
        }
    }
}
