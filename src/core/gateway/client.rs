//! HTTP client for the payment gateway's pay and status endpoints.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use super::types::{GatewayError, GatewayResult, PayResponse, PaymentStateReport};

/// Path the pay call is posted to; the same string signs the request.
pub const PAY_PATH: &str = "/pg/v1/pay";

/// Prefix of the status poll path; the full path signs the poll.
pub const STATUS_PATH_PREFIX: &str = "/pg/v1/status";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("EchoVoice-Server/", env!("CARGO_PKG_VERSION"));

/// Builds the status path for a transaction.
pub fn status_path(merchant_id: &str, merchant_transaction_id: &str) -> String {
    format!("{STATUS_PATH_PREFIX}/{merchant_id}/{merchant_transaction_id}")
}

/// Pooled HTTP client for the gateway.
///
/// The base URL travels with each call rather than the client because it
/// is part of the payment configuration, which is resolved per request.
/// A gateway hanging past the timeout surfaces as [`GatewayError::Unavailable`].
#[derive(Clone)]
pub struct GatewayClient {
    http_client: Client,
}

impl GatewayClient {
    pub fn new(timeout: Duration) -> GatewayResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { http_client })
    }

    /// Posts a signed payload to the pay endpoint and returns the redirect
    /// URL the payer completes the purchase at.
    pub async fn initiate_payment(
        &self,
        base_url: &str,
        base64_payload: &str,
        checksum: &str,
        merchant_id: &str,
    ) -> GatewayResult<String> {
        let url = join_url(base_url, PAY_PATH);
        debug!(merchant_id, %url, "Posting payment initiation to gateway");

        let response = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("X-VERIFY", checksum)
            .header("X-MERCHANT-ID", merchant_id)
            .json(&serde_json::json!({ "request": base64_payload }))
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("Pay request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("Failed to read pay response: {e}")))?;

        if !status.is_success() {
            let detail = gateway_message(&body).unwrap_or_else(|| "no detail".to_string());
            warn!(%status, detail, "Gateway pay call failed");
            return Err(GatewayError::Unavailable(format!(
                "Gateway answered {status}: {detail}"
            )));
        }

        let parsed: PayResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Unavailable(format!("Unparseable pay response: {e}")))?;

        if !parsed.success {
            let reason = parsed
                .message
                .or(parsed.code)
                .unwrap_or_else(|| "no reason given".to_string());
            return Err(GatewayError::Rejected(reason));
        }

        parsed
            .redirect_url()
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Unavailable("Pay response missing redirect URL".to_string()))
    }

    /// Polls the status endpoint for a transaction's current state.
    ///
    /// The checksum is computed by the caller over an empty payload plus
    /// [`status_path`], since only the caller holds the salt key.
    pub async fn check_status(
        &self,
        base_url: &str,
        merchant_id: &str,
        merchant_transaction_id: &str,
        checksum: &str,
    ) -> GatewayResult<PaymentStateReport> {
        let url = join_url(base_url, &status_path(merchant_id, merchant_transaction_id));
        debug!(merchant_transaction_id, %url, "Polling gateway for payment status");

        let response = self
            .http_client
            .get(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("X-VERIFY", checksum)
            .header("X-MERCHANT-ID", merchant_id)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("Status request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            GatewayError::Unavailable(format!("Failed to read status response: {e}"))
        })?;

        if !status.is_success() {
            let detail = gateway_message(&body).unwrap_or_else(|| "no detail".to_string());
            return Err(GatewayError::Unavailable(format!(
                "Gateway answered {status}: {detail}"
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| GatewayError::Unavailable(format!("Unparseable status response: {e}")))
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Pulls a human-readable reason out of a gateway error body, if the body
/// is the usual envelope.
fn gateway_message(body: &str) -> Option<String> {
    let parsed: PayResponse = serde_json::from_str(body).ok()?;
    parsed.message.or(parsed.code)
}
