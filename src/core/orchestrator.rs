//! Credit transaction orchestrator.
//!
//! Couples the pricing policy, the ledger, and the payment gateway into
//! the purchase and usage flows. Purchases move through a three-state
//! machine; the initiated state exists only inside the initiation call:
//!
//! ```text
//!   initiate_purchase             callback / status poll
//!  ─────────────────────▶ pending ───────────┬────▶ success (credits granted)
//!   validate, sign,                          │
//!   record, hand off                         └────▶ failed
//! ```
//!
//! Ordering rules the flows maintain:
//! - The pending row is recorded before the gateway learns about the
//!   purchase. A crash between the two leaves a reconcilable row, never
//!   an invisible payment.
//! - Usage debits credits before generation starts.
//! - Settlement goes through [`LedgerStore::settle_purchase`], which
//!   flips status and grants credits in one transaction, so re-delivered
//!   callbacks cannot double-credit.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{PaymentConfig, ServerConfig};
use crate::core::gateway::{
    self, GatewayClient, GatewayError, PAY_PATH, PaymentStateReport,
};
use crate::core::ledger::{
    LedgerError, LedgerStore, SettleOutcome, TransactionRecord, TransactionStatus,
};
use crate::core::pricing::{self, CreditKind, UsageAction};
use crate::errors::app_error::{AppError, AppResult};
use crate::utils::phone_validation::validate_phone_number;

/// Successful purchase initiation.
#[derive(Debug)]
pub struct InitiatedPurchase {
    pub merchant_transaction_id: String,
    /// Hosted-checkout URL the payer is sent to
    pub redirect_url: String,
}

/// Successful usage charge.
#[derive(Debug, Clone, Copy)]
pub struct ChargedUsage {
    pub kind: CreditKind,
    pub cost: i64,
    pub remaining: i64,
}

/// What a verified settlement report did to the ledger.
///
/// Only signature failures, undecodable bodies, and store errors are
/// `Err` at this level; everything here is an outcome the callback route
/// acknowledges with 200 so the gateway stops retrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The report flipped the transaction to a terminal status
    Applied(TransactionStatus),
    /// Re-delivery of a status already recorded
    AlreadySettled(TransactionStatus),
    /// Report contradicts the recorded terminal status; ledger kept as is
    Conflicting {
        reported: TransactionStatus,
        recorded: TransactionStatus,
    },
    /// Gateway still considers the payment in flight
    StillPending,
    /// Report for a transaction the ledger never recorded
    UnknownTransaction(String),
}

/// Purchase request as the client submits it, base64-encoded JSON.
///
/// Unknown fields are rejected outright: the payload is re-signed and
/// forwarded to the gateway, and nothing a client invents should travel
/// under our signature.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PurchasePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    merchant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    merchant_transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    merchant_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mobile_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payment_instrument: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    credits: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    redirect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    redirect_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    callback_url: Option<String>,
}

/// Validated extract of a purchase payload.
struct PurchaseFields {
    merchant_id: String,
    merchant_transaction_id: String,
    /// Minor units (paise)
    amount: i64,
    credits: i64,
    credit_kind: Option<CreditKind>,
}

impl PurchasePayload {
    fn validate(&self) -> AppResult<PurchaseFields> {
        let mut absent = Vec::new();
        if self.merchant_id.is_none() {
            absent.push("merchantId");
        }
        if self.merchant_transaction_id.is_none() {
            absent.push("merchantTransactionId");
        }
        if self.amount.is_none() {
            absent.push("amount");
        }
        if self.mobile_number.is_none() {
            absent.push("mobileNumber");
        }
        if self.payment_instrument.is_none() {
            absent.push("paymentInstrument");
        }
        if !absent.is_empty() {
            return Err(AppError::MissingFields(absent.join(", ")));
        }

        let (Some(merchant_id), Some(merchant_transaction_id), Some(amount), Some(mobile_number)) = (
            self.merchant_id.clone(),
            self.merchant_transaction_id.clone(),
            self.amount,
            self.mobile_number.as_deref(),
        ) else {
            return Err(AppError::MissingFields("purchase payload".to_string()));
        };

        if amount <= 0 {
            return Err(AppError::InvalidPayload(format!(
                "amount must be positive, got {amount}"
            )));
        }
        if !validate_phone_number(mobile_number) {
            return Err(AppError::InvalidPayload(
                "mobileNumber is not a valid phone number".to_string(),
            ));
        }

        let credits = self.credits.unwrap_or(0);
        if credits < 0 {
            return Err(AppError::InvalidPayload(format!(
                "credits must be non-negative, got {credits}"
            )));
        }

        // Credits without a product name could never be granted; a
        // product name alone just records intent.
        let credit_kind = match (credits > 0, self.product_name.as_deref()) {
            (true, None) => return Err(AppError::MissingFields("productName".to_string())),
            (_, Some(name)) => Some(CreditKind::from_product_name(name)?),
            (false, None) => None,
        };

        Ok(PurchaseFields {
            merchant_id,
            merchant_transaction_id,
            amount,
            credits,
            credit_kind,
        })
    }
}

/// Orchestrates purchases and usage charges against the ledger.
pub struct CreditOrchestrator {
    config: Arc<ServerConfig>,
    ledger: LedgerStore,
    gateway: GatewayClient,
}

impl CreditOrchestrator {
    pub fn new(config: Arc<ServerConfig>, ledger: LedgerStore, gateway: GatewayClient) -> Self {
        Self {
            config,
            ledger,
            gateway,
        }
    }

    /// Validates a purchase payload, records it as `pending`, and hands it
    /// to the gateway. Returns the hosted-checkout redirect URL.
    ///
    /// On gateway failure the pending row stays in place; the
    /// reconciliation sweep settles it once the gateway answers again.
    pub async fn initiate_purchase(
        &self,
        account_id: &str,
        raw_payload: &str,
    ) -> AppResult<InitiatedPurchase> {
        let decoded = BASE64
            .decode(raw_payload)
            .map_err(|e| AppError::InvalidPayload(format!("payload is not valid base64: {e}")))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| AppError::InvalidPayload("payload is not valid UTF-8".to_string()))?;
        let mut payload: PurchasePayload = serde_json::from_str(&decoded)
            .map_err(|e| AppError::InvalidPayload(format!("payload is not a purchase request: {e}")))?;

        let fields = payload.validate()?;
        let payment = self.payment_config()?;
        if fields.merchant_id != payment.merchant_id {
            return Err(AppError::InvalidPayload(format!(
                "merchantId {} does not belong to this deployment",
                fields.merchant_id
            )));
        }

        // Redirect and callback URLs are server-owned, injected as the
        // last mutation so the checksum covers the final payload.
        let callback_url = self.callback_url();
        payload.redirect_mode = Some("POST".to_string());
        payload.redirect_url = Some(callback_url.clone());
        payload.callback_url = Some(callback_url);

        let serialized = serde_json::to_string(&payload)
            .map_err(|e| AppError::Internal(format!("Failed to encode gateway payload: {e}")))?;
        let encoded = BASE64.encode(serialized);
        let checksum = gateway::compute_checksum(
            &encoded,
            PAY_PATH,
            payment.salt_key.expose(),
            &payment.salt_index,
        );

        let record = TransactionRecord::pending(
            fields.merchant_transaction_id.as_str(),
            account_id,
            fields.merchant_id.as_str(),
            fields.amount / 100,
            fields.credits,
            fields.credit_kind,
        );
        self.ledger.append_transaction(&record)?;
        info!(
            merchant_transaction_id = %fields.merchant_transaction_id,
            account_id,
            amount = record.amount,
            credits = record.credits,
            "Recorded pending purchase"
        );

        let redirect_url = self
            .gateway
            .initiate_payment(
                &payment.base_url,
                &encoded,
                &checksum,
                &fields.merchant_id,
            )
            .await
            .inspect_err(|e| {
                warn!(
                    merchant_transaction_id = %fields.merchant_transaction_id,
                    error = %e,
                    "Gateway initiation failed, transaction stays pending for reconciliation"
                );
            })?;

        Ok(InitiatedPurchase {
            merchant_transaction_id: fields.merchant_transaction_id,
            redirect_url,
        })
    }

    /// Applies a gateway callback.
    ///
    /// The signature is checked before anything else; a body that fails
    /// verification never touches the ledger, whatever status it claims.
    pub fn apply_callback(&self, x_verify: &str, response_payload: &str) -> AppResult<CallbackOutcome> {
        let payment = self.payment_config()?;

        // Callbacks are signed over the body alone, no api path.
        if !gateway::verify_checksum(
            x_verify,
            response_payload,
            "",
            payment.salt_key.expose(),
            &payment.salt_index,
        ) {
            warn!("Callback signature verification failed");
            return Err(AppError::InvalidSignature);
        }

        let report = decode_state_report(response_payload)?;
        let Some(merchant_transaction_id) = report.merchant_transaction_id() else {
            return Err(AppError::InvalidPayload(
                "callback carries no merchantTransactionId".to_string(),
            ));
        };

        let state_code = report.state_code().unwrap_or_default();
        self.settle(merchant_transaction_id, state_code)
    }

    /// Settles one stale pending transaction by polling the gateway's
    /// status endpoint. Used by the reconciliation sweep.
    pub async fn reconcile_transaction(
        &self,
        record: &TransactionRecord,
    ) -> AppResult<CallbackOutcome> {
        let payment = self.payment_config()?;
        let path = gateway::status_path(&record.merchant_id, &record.transaction_id);
        let checksum = gateway::compute_checksum(
            "",
            &path,
            payment.salt_key.expose(),
            &payment.salt_index,
        );

        let report = self
            .gateway
            .check_status(
                &payment.base_url,
                &record.merchant_id,
                &record.transaction_id,
                &checksum,
            )
            .await?;

        let state_code = report.state_code().unwrap_or_default();
        self.settle(&record.transaction_id, state_code)
    }

    /// Prices an action and debits the matching balance. Callers invoke
    /// generation only after this returns `Ok`.
    pub fn charge_for_usage(
        &self,
        account_id: &str,
        action: &UsageAction<'_>,
    ) -> AppResult<ChargedUsage> {
        let cost = pricing::cost(action)?;
        let kind = action.credit_kind();
        let remaining = self.ledger.debit(account_id, kind, cost)?;
        info!(account_id, kind = %kind, cost, remaining, "Charged usage");
        Ok(ChargedUsage {
            kind,
            cost,
            remaining,
        })
    }

    fn settle(&self, merchant_transaction_id: &str, state_code: &str) -> AppResult<CallbackOutcome> {
        let Some(reported) = status_for_state_code(state_code) else {
            info!(
                merchant_transaction_id,
                "Gateway still reports the payment as pending"
            );
            return Ok(CallbackOutcome::StillPending);
        };

        match self.ledger.settle_purchase(merchant_transaction_id, reported) {
            Ok(SettleOutcome::Applied) => {
                info!(merchant_transaction_id, status = %reported, "Settled purchase");
                Ok(CallbackOutcome::Applied(reported))
            }
            Ok(SettleOutcome::AlreadySettled) => {
                info!(
                    merchant_transaction_id,
                    status = %reported,
                    "Purchase already settled, report ignored"
                );
                Ok(CallbackOutcome::AlreadySettled(reported))
            }
            Ok(SettleOutcome::Conflicting { recorded }) => {
                warn!(
                    merchant_transaction_id,
                    reported = %reported,
                    recorded = %recorded,
                    "Settlement report conflicts with the recorded outcome"
                );
                Ok(CallbackOutcome::Conflicting { reported, recorded })
            }
            Err(LedgerError::UnknownTransaction(id)) => {
                warn!(
                    merchant_transaction_id = %id,
                    "Settlement report for a transaction the ledger never recorded"
                );
                Ok(CallbackOutcome::UnknownTransaction(id))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn payment_config(&self) -> AppResult<PaymentConfig> {
        self.config
            .payment_config()
            .map_err(AppError::ServerConfiguration)
    }

    fn callback_url(&self) -> String {
        format!(
            "{}/api/payment/callback",
            self.config.public_base_url.trim_end_matches('/')
        )
    }
}

fn decode_state_report(response_payload: &str) -> AppResult<PaymentStateReport> {
    let decoded = BASE64.decode(response_payload).map_err(|e| {
        GatewayError::MalformedPayload(format!("callback body is not valid base64: {e}"))
    })?;
    let report = serde_json::from_slice(&decoded).map_err(|e| {
        GatewayError::MalformedPayload(format!("callback body is not a payment report: {e}"))
    })?;
    Ok(report)
}

/// Success and pending have dedicated handling; every other code the
/// gateway reports settles the purchase as failed.
fn status_for_state_code(code: &str) -> Option<TransactionStatus> {
    match code {
        "PAYMENT_SUCCESS" => Some(TransactionStatus::Success),
        "PAYMENT_PENDING" => None,
        _ => Some(TransactionStatus::Failed),
    }
}
