//! URL validation for configured endpoints
//!
//! Light validation applied to operator-supplied base URLs (public base
//! URL, payment gateway, speech backend) at configuration load time.
//! Catches malformed values before they turn into confusing request
//! failures deep inside a purchase flow.

use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be http or https, got: {0}")]
    UnsupportedScheme(String),

    #[error("URL must have a host")]
    MissingHost,
}

/// Validates that a string is an absolute http(s) URL with a host.
///
/// http is accepted because sandbox gateways and local test backends
/// run without TLS; production deployments are expected to use https.
pub fn validate_http_url(url: &str) -> Result<(), UrlValidationError> {
    let parsed = Url::parse(url)?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(UrlValidationError::UnsupportedScheme(other.to_string())),
    }

    if parsed.host_str().is_none() {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(())
}
