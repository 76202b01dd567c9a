//! Application error type
//!
//! Central error taxonomy for the HTTP surface. Domain errors from the
//! pricing, ledger, gateway, and speech modules convert into `AppError`
//! so handlers can use `?` and get a consistent JSON error response.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::core::gateway::GatewayError;
use crate::core::ledger::LedgerError;
use crate::core::pricing::PricingError;
use crate::core::speech::SpeechError;

/// Result type for handler and orchestrator operations
pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    /// Request body could not be decoded or fails structural validation
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Request decoded but required fields are absent
    #[error("Missing required fields: {0}")]
    MissingFields(String),

    /// Action name outside the supported set
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    /// Caller identity missing where one is required
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Gateway callback signature did not verify
    #[error("Invalid signature")]
    InvalidSignature,

    /// Account balance too low for the requested debit
    #[error("Insufficient credits: {0}")]
    InsufficientCredits(String),

    /// No account row for the given id
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Callback or status poll referenced a transaction we never recorded
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    /// Transaction id already used by an earlier purchase
    #[error("Duplicate transaction id: {0}")]
    DuplicateTransactionId(String),

    /// Terminal transaction reported with a conflicting outcome
    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    /// Required server-side configuration is absent or unusable
    #[error("Server configuration error: {0}")]
    ServerConfiguration(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Payment gateway unreachable or answered garbage
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Payment gateway parsed our request and said no
    #[error("Payment rejected: {0}")]
    PaymentRejected(String),

    /// Speech inference backend failed after the debit was taken
    #[error("Speech backend error: {0}")]
    SpeechBackend(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidPayload(_)
            | AppError::MissingFields(_)
            | AppError::UnsupportedAction(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::InvalidSignature => StatusCode::UNAUTHORIZED,
            AppError::InsufficientCredits(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::AccountNotFound(_) | AppError::UnknownTransaction(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::DuplicateTransactionId(_) | AppError::InvalidTransition(_) => {
                StatusCode::CONFLICT
            }
            AppError::ServerConfiguration(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::GatewayUnavailable(_)
            | AppError::PaymentRejected(_)
            | AppError::SpeechBackend(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "Request failed");
        }

        // 500-class details (store failures, missing configuration) stay
        // in the logs; callers get a generic message.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({"error": message}));
        (status, body).into_response()
    }
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::UnsupportedAction(action) => AppError::UnsupportedAction(action),
            PricingError::InvalidDuration(_) => AppError::InvalidPayload(err.to_string()),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AccountNotFound(id) => AppError::AccountNotFound(id),
            LedgerError::InsufficientBalance { .. } => {
                AppError::InsufficientCredits(err.to_string())
            }
            LedgerError::DuplicateTransactionId(id) => AppError::DuplicateTransactionId(id),
            LedgerError::UnknownTransaction(id) => AppError::UnknownTransaction(id),
            LedgerError::InvalidTransition { .. } => AppError::InvalidTransition(err.to_string()),
            LedgerError::InvalidAmount(_) => AppError::InvalidPayload(err.to_string()),
            // Account creation happens through the CLI, not a route; these
            // only reach HTTP callers through a bug.
            LedgerError::DuplicateAccount(_) | LedgerError::Storage(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable(msg) => AppError::GatewayUnavailable(msg),
            GatewayError::Rejected(msg) => AppError::PaymentRejected(msg),
            GatewayError::InvalidSignature => AppError::InvalidSignature,
            GatewayError::MalformedPayload(msg) => AppError::InvalidPayload(msg),
        }
    }
}

impl From<SpeechError> for AppError {
    fn from(err: SpeechError) -> Self {
        AppError::SpeechBackend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_map_to_400() {
        assert_eq!(
            AppError::InvalidPayload("not base64".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::MissingFields("amount".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::UnsupportedAction("Dubbing".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_signature_failure_maps_to_401() {
        assert_eq!(
            AppError::InvalidSignature.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_insufficient_credits_maps_to_402() {
        assert_eq!(
            AppError::InsufficientCredits("need 237, have 12".to_string()).status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
    }

    #[test]
    fn test_conflict_family_maps_to_409() {
        assert_eq!(
            AppError::DuplicateTransactionId("MT1".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::InvalidTransition("success -> failed".to_string()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_gateway_failures_map_to_502() {
        assert_eq!(
            AppError::GatewayUnavailable("timeout".to_string()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::PaymentRejected("KEY_NOT_CONFIGURED".to_string()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_error_display() {
        let err = AppError::MissingFields("merchantId, amount".to_string());
        assert_eq!(err.to_string(), "Missing required fields: merchantId, amount");
    }

    #[tokio::test]
    async fn test_internal_error_body_masks_details() {
        let response = AppError::Internal("sqlite disk I/O error".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_client_error_body_keeps_message() {
        let response = AppError::InsufficientCredits("balance too low".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Insufficient credits: balance too low");
    }
}
