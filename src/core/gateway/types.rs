//! Gateway error taxonomy and wire envelopes.

use serde::Deserialize;
use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors from talking to the payment gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Network failure, timeout, non-2xx answer, or an unparseable body
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),

    /// The gateway understood the request and declined it
    #[error("Gateway rejected the payment: {0}")]
    Rejected(String),

    /// A callback X-VERIFY header did not match the payload
    #[error("Callback signature verification failed")]
    InvalidSignature,

    /// A body that does not decode into the expected wire shape
    #[error("Malformed gateway payload: {0}")]
    MalformedPayload(String),
}

/// Answer to a pay call.
///
/// On success the redirect URL the user completes the payment at sits
/// three levels deep; [`PayResponse::redirect_url`] walks the nesting.
#[derive(Debug, Deserialize)]
pub struct PayResponse {
    pub success: bool,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<PayResponseData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayResponseData {
    #[serde(default)]
    pub instrument_response: Option<InstrumentResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentResponse {
    #[serde(default)]
    pub redirect_info: Option<RedirectInfo>,
}

#[derive(Debug, Deserialize)]
pub struct RedirectInfo {
    pub url: String,
}

impl PayResponse {
    /// URL the user is redirected to, when the gateway returned one.
    pub fn redirect_url(&self) -> Option<&str> {
        self.data
            .as_ref()?
            .instrument_response
            .as_ref()?
            .redirect_info
            .as_ref()
            .map(|info| info.url.as_str())
    }
}

/// Payment outcome report.
///
/// Callbacks and status polls share this envelope: the callback body is a
/// base64 encoding of it, the status endpoint returns it directly. The
/// `code` field carries the state (`PAYMENT_SUCCESS`, `PAYMENT_PENDING`,
/// `PAYMENT_ERROR`, ...).
#[derive(Debug, Deserialize)]
pub struct PaymentStateReport {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<PaymentStateData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStateData {
    #[serde(default)]
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub merchant_transaction_id: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub state: Option<String>,
}

impl PaymentStateReport {
    /// Merchant transaction id the report refers to, when present.
    pub fn merchant_transaction_id(&self) -> Option<&str> {
        self.data.as_ref()?.merchant_transaction_id.as_deref()
    }

    /// State code reported by the gateway, when present.
    pub fn state_code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pay_response_redirect_url() {
        let body = r#"{
            "success": true,
            "code": "PAYMENT_INITIATED",
            "message": "Payment initiated",
            "data": {
                "merchantId": "MERCHANT1",
                "instrumentResponse": {
                    "type": "PAY_PAGE",
                    "redirectInfo": {
                        "url": "https://pay.example.com/redirect/abc",
                        "method": "GET"
                    }
                }
            }
        }"#;
        let parsed: PayResponse = serde_json::from_str(body).expect("valid pay response");
        assert!(parsed.success);
        assert_eq!(
            parsed.redirect_url(),
            Some("https://pay.example.com/redirect/abc")
        );
    }

    #[test]
    fn test_pay_response_without_redirect_url() {
        let body = r#"{"success": true, "code": "PAYMENT_INITIATED", "data": {}}"#;
        let parsed: PayResponse = serde_json::from_str(body).expect("valid pay response");
        assert_eq!(parsed.redirect_url(), None);
    }

    #[test]
    fn test_payment_state_report_fields() {
        let body = r#"{
            "success": true,
            "code": "PAYMENT_SUCCESS",
            "message": "Your payment is successful.",
            "data": {
                "merchantId": "MERCHANT1",
                "merchantTransactionId": "MT123",
                "transactionId": "T456",
                "amount": 49900,
                "state": "COMPLETED"
            }
        }"#;
        let report: PaymentStateReport = serde_json::from_str(body).expect("valid report");
        assert_eq!(report.state_code(), Some("PAYMENT_SUCCESS"));
        assert_eq!(report.merchant_transaction_id(), Some("MT123"));
        assert_eq!(report.data.as_ref().and_then(|d| d.amount), Some(49900));
    }

    #[test]
    fn test_payment_state_report_tolerates_missing_data() {
        let body = r#"{"success": false, "code": "PAYMENT_ERROR"}"#;
        let report: PaymentStateReport = serde_json::from_str(body).expect("valid report");
        assert_eq!(report.state_code(), Some("PAYMENT_ERROR"));
        assert_eq!(report.merchant_transaction_id(), None);
    }
}
