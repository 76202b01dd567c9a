//! Caller identity
//!
//! The auth middleware resolves a bearer secret to an account id and
//! stores the result in request extensions as [`Auth`]. Handlers that
//! need an identity pull it back out with `Extension<Auth>`.

use subtle::ConstantTimeEq;

use crate::config::AuthApiSecret;
use crate::errors::app_error::AppError;

/// Resolved caller identity, inserted into request extensions by the
/// auth middleware. `id` is `None` when authentication is disabled.
#[derive(Clone, Debug, Default)]
pub struct Auth {
    pub id: Option<String>,
}

impl Auth {
    pub fn new(id: String) -> Self {
        Self { id: Some(id) }
    }

    /// Identity-less context used when authentication is disabled.
    pub fn empty() -> Self {
        Self { id: None }
    }

    /// Account id for handlers that cannot work without one.
    pub fn account_id(&self) -> Result<&str, AppError> {
        self.id
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized("No account identity on request".to_string()))
    }
}

/// Match a presented bearer token against the configured API secrets.
///
/// Every entry is compared in constant time and the loop never exits
/// early, so timing does not reveal which secret (if any) matched.
pub fn match_api_secret_id(token: &str, secrets: &[AuthApiSecret]) -> Option<String> {
    let token_bytes = token.as_bytes();
    let mut matched: Option<String> = None;

    for entry in secrets {
        let secret_bytes = entry.secret.as_bytes();
        if secret_bytes.len() == token_bytes.len() && bool::from(secret_bytes.ct_eq(token_bytes)) {
            matched = Some(entry.id.clone());
        }
    }

    matched
}
