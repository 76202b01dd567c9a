//! Payment handlers: purchase initiation and the gateway callback.
//!
//! Initiation is a protected route; the caller submits the purchase
//! payload base64-encoded, the orchestrator validates and signs it, and
//! the response carries the hosted-checkout URL to redirect the payer
//! to. The callback route is gateway-facing: it is authenticated by the
//! `X-VERIFY` checksum rather than a bearer token, and once the
//! signature verifies it always answers 200 so the gateway stops
//! redelivering.

use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    response::Json,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::auth::Auth;
use crate::core::orchestrator::CallbackOutcome;
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

/// Request body for POST /payment/initiate.
#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    /// Base64-encoded JSON purchase payload
    pub payload: String,
}

/// Request body for POST /payment/callback.
#[derive(Debug, Deserialize)]
pub struct PaymentCallbackRequest {
    /// Base64-encoded settlement report, signed by `X-VERIFY`
    pub response: String,
}

/// Handler for POST /payment/initiate - Start a credit purchase.
///
/// # Request Body
///
/// ```json
/// {
///   "payload": "<base64-encoded purchase JSON>"
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "url": "https://pay.example.com/checkout/..."
/// }
/// ```
pub async fn initiate_payment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    Json(request): Json<InitiatePaymentRequest>,
) -> AppResult<Json<Value>> {
    let account_id = auth.account_id()?;
    let initiated = state
        .orchestrator
        .initiate_purchase(account_id, &request.payload)
        .await?;
    Ok(Json(json!({ "url": initiated.redirect_url })))
}

/// Handler for POST /payment/callback - Settle a purchase from the
/// gateway's report.
///
/// A missing or unverifiable `X-VERIFY` header answers 401 and a body
/// that cannot be decoded answers 400; both make the gateway retry.
/// Every verified report answers 200 with the resulting transaction
/// status, including redeliveries and reports for transactions this
/// server never recorded.
pub async fn payment_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<PaymentCallbackRequest>,
) -> AppResult<Json<Value>> {
    let x_verify = headers
        .get("X-VERIFY")
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    let outcome = state.orchestrator.apply_callback(x_verify, &request.response)?;
    Ok(Json(callback_body(&outcome)))
}

/// 200-body for a verified callback. The gateway only needs an
/// acknowledgement; the status field is for log correlation.
fn callback_body(outcome: &CallbackOutcome) -> Value {
    match outcome {
        CallbackOutcome::Applied(status) | CallbackOutcome::AlreadySettled(status) => {
            json!({ "status": status.as_str() })
        }
        CallbackOutcome::Conflicting { recorded, .. } => {
            json!({ "status": recorded.as_str() })
        }
        CallbackOutcome::StillPending => json!({ "status": "pending" }),
        CallbackOutcome::UnknownTransaction(_) => json!({ "status": "unknown" }),
    }
}
