//! Configuration module for the EchoVoice server
//!
//! All configuration comes from environment variables (plus a .env file
//! loaded at startup). Payment gateway settings are optional at boot so
//! the server can run without a gateway account; purchase requests then
//! fail with a configuration error until the full block is present.

use std::fmt;
use std::path::PathBuf;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::utils::url_validation::validate_http_url;

/// TLS configuration for HTTPS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// API secret authentication entry with a client identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthApiSecret {
    pub id: String,
    pub secret: String,
}

/// Payment gateway salt key.
///
/// Zeroized on drop and redacted from Debug output so it never lands in
/// logs or panic messages.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SaltKey(String);

impl SaltKey {
    pub fn new(key: String) -> Self {
        Self(key)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SaltKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SaltKey(<redacted>)")
    }
}

/// Fully resolved payment gateway settings for a single request.
///
/// Obtained through [`ServerConfig::payment_config`], which fails when
/// the gateway block is absent from the environment.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub base_url: String,
    pub merchant_id: String,
    pub salt_key: SaltKey,
    pub salt_index: String,
}

/// Server configuration
///
/// Contains everything needed to run the EchoVoice server:
/// - Server settings (host, port, TLS)
/// - Public base URL for gateway redirect/callback construction
/// - Ledger database path
/// - Payment gateway credentials (optional at boot)
/// - Speech inference backend endpoint
/// - Authentication settings
/// - Security settings (CORS, rate limiting)
/// - Pending-transaction reconciliation intervals
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Externally reachable base URL. Used to build the redirect and
    /// callback URLs injected into gateway pay requests.
    pub public_base_url: String,

    // Ledger store
    pub database_path: PathBuf,

    // Payment gateway settings. All-or-nothing: validation rejects a
    // partially configured block at boot.
    pub payment_gateway_base_url: Option<String>,
    pub payment_merchant_id: Option<String>,
    pub payment_salt_key: Option<SaltKey>,
    pub payment_salt_index: String,

    // Speech inference backend
    pub speech_api_url: Option<String>,
    pub speech_api_key: Option<String>,

    // Authentication configuration
    pub auth_api_secrets: Vec<AuthApiSecret>,
    pub auth_required: bool,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,

    // Reconciliation of stale pending transactions
    /// Sweep interval in seconds; 0 disables the reconciler
    /// Default: 300
    pub reconcile_interval_seconds: u64,
    /// Minimum age before a pending transaction is polled
    /// Default: 900
    pub reconcile_min_age_seconds: u64,
}

/// Zeroize secret material when the config is dropped. The salt key
/// zeroizes itself; the remaining string secrets are handled here.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        if let Some(ref mut key) = self.speech_api_key {
            key.zeroize();
        }
        for entry in &mut self.auth_api_secrets {
            entry.secret.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// The .env file (if any) is loaded in main.rs before this runs, so
    /// actual environment variables override .env values. Validation
    /// runs on the final result.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let host = env_or("HOST", "0.0.0.0");
        let port: u16 = parse_env("PORT", 3000)?;

        let tls = match (env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH")) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => return Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".into()),
        };

        let public_base_url = env_or("PUBLIC_BASE_URL", "http://localhost:3000");
        let database_path = PathBuf::from(env_or("DATABASE_PATH", "echovoice.db"));

        let payment_gateway_base_url = env_var("PAYMENT_GATEWAY_BASE_URL");
        let payment_merchant_id = env_var("PAYMENT_MERCHANT_ID");
        let payment_salt_key = env_var("PAYMENT_SALT_KEY").map(SaltKey::new);
        let payment_salt_index = env_or("PAYMENT_SALT_INDEX", "1");

        let speech_api_url = env_var("SPEECH_API_URL");
        let speech_api_key = env_var("SPEECH_API_KEY");

        let auth_api_secrets = load_auth_api_secrets()?;
        let auth_required = match env_var("AUTH_REQUIRED") {
            Some(value) => parse_bool("AUTH_REQUIRED", &value)?,
            None => !auth_api_secrets.is_empty(),
        };

        let config = Self {
            host,
            port,
            tls,
            public_base_url,
            database_path,
            payment_gateway_base_url,
            payment_merchant_id,
            payment_salt_key,
            payment_salt_index,
            speech_api_url,
            speech_api_key,
            auth_api_secrets,
            auth_required,
            cors_allowed_origins: env_var("CORS_ALLOWED_ORIGINS"),
            rate_limit_requests_per_second: parse_env("RATE_LIMIT_REQUESTS_PER_SECOND", 60)?,
            rate_limit_burst_size: parse_env("RATE_LIMIT_BURST_SIZE", 10)?,
            reconcile_interval_seconds: parse_env("RECONCILE_INTERVAL_SECONDS", 300)?,
            reconcile_min_age_seconds: parse_env("RECONCILE_MIN_AGE_SECONDS", 900)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        validate_http_url(&self.public_base_url)
            .map_err(|e| format!("Invalid PUBLIC_BASE_URL: {e}"))?;

        if let Some(ref url) = self.payment_gateway_base_url {
            validate_http_url(url).map_err(|e| format!("Invalid PAYMENT_GATEWAY_BASE_URL: {e}"))?;
        }
        if let Some(ref url) = self.speech_api_url {
            validate_http_url(url).map_err(|e| format!("Invalid SPEECH_API_URL: {e}"))?;
        }

        // A half-configured gateway block is a deployment mistake, not a
        // server that intentionally runs without payments.
        let payment_vars = [
            (
                "PAYMENT_GATEWAY_BASE_URL",
                self.payment_gateway_base_url.is_some(),
            ),
            ("PAYMENT_MERCHANT_ID", self.payment_merchant_id.is_some()),
            ("PAYMENT_SALT_KEY", self.payment_salt_key.is_some()),
        ];
        let set_count = payment_vars.iter().filter(|(_, set)| *set).count();
        if set_count != 0 && set_count != payment_vars.len() {
            let missing: Vec<&str> = payment_vars
                .iter()
                .filter(|(_, set)| !*set)
                .map(|(name, _)| *name)
                .collect();
            return Err(format!(
                "Incomplete payment gateway configuration, missing: {}",
                missing.join(", ")
            )
            .into());
        }

        if self.auth_required && self.auth_api_secrets.is_empty() {
            return Err(
                "AUTH_REQUIRED is set but no API secrets are configured \
                 (set AUTH_API_SECRETS_JSON or AUTH_API_SECRET)"
                    .into(),
            );
        }

        if self.rate_limit_requests_per_second == 0 || self.rate_limit_burst_size == 0 {
            return Err("Rate limit values must be greater than zero".into());
        }

        Ok(())
    }

    /// Get the server address as a string in "host:port" form
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Check if API secret authentication is configured
    pub fn has_api_secret_auth(&self) -> bool {
        !self.auth_api_secrets.is_empty()
    }

    /// Check if the background reconciler should run
    pub fn reconcile_enabled(&self) -> bool {
        self.reconcile_interval_seconds > 0
    }

    /// Resolved payment gateway settings.
    ///
    /// Fails with the list of required variables when the gateway block
    /// is absent, so purchase handlers can surface a configuration error
    /// instead of half-signing a request.
    pub fn payment_config(&self) -> Result<PaymentConfig, String> {
        match (
            &self.payment_gateway_base_url,
            &self.payment_merchant_id,
            &self.payment_salt_key,
        ) {
            (Some(base_url), Some(merchant_id), Some(salt_key)) => Ok(PaymentConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                merchant_id: merchant_id.clone(),
                salt_key: salt_key.clone(),
                salt_index: self.payment_salt_index.clone(),
            }),
            _ => Err("Payment gateway not configured \
                 (PAYMENT_GATEWAY_BASE_URL, PAYMENT_MERCHANT_ID, PAYMENT_SALT_KEY)"
                .to_string()),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    env_var(name).unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(name: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match env_var(name) {
        Some(value) => value
            .parse()
            .map_err(|e| format!("Invalid value for {name}: {e}")),
        None => Ok(default),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(format!("Invalid boolean for {name}: {value}")),
    }
}

fn load_auth_api_secrets() -> Result<Vec<AuthApiSecret>, Box<dyn std::error::Error>> {
    if let Some(json) = env_var("AUTH_API_SECRETS_JSON") {
        return parse_auth_api_secrets_json(&json);
    }

    if let Some(secret) = env_var("AUTH_API_SECRET") {
        let id = env_or("AUTH_API_SECRET_ID", "default");
        return Ok(vec![AuthApiSecret { id, secret }]);
    }

    Ok(Vec::new())
}

pub(crate) fn parse_auth_api_secrets_json(
    json_str: &str,
) -> Result<Vec<AuthApiSecret>, Box<dyn std::error::Error>> {
    #[derive(serde::Deserialize)]
    struct AuthApiSecretJson {
        id: String,
        secret: String,
    }

    let secrets: Vec<AuthApiSecretJson> = serde_json::from_str(json_str)
        .map_err(|e| format!("Invalid AUTH_API_SECRETS_JSON format: {e}"))?;

    Ok(secrets
        .into_iter()
        .map(|entry| AuthApiSecret {
            id: entry.id,
            secret: entry.secret,
        })
        .collect())
}
