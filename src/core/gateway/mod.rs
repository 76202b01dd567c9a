//! Payment gateway adapter.
//!
//! Wraps the hosted-checkout gateway behind three exchanges, all
//! authenticated with the same salted checksum:
//!
//! ```text
//!                    POST {base}/pg/v1/pay
//!  initiate ───────  body: {"request": base64(payload)}
//!                    X-VERIFY: sha256(payload + "/pg/v1/pay" + salt) ### index
//!                    ◀─ redirect URL for the payer
//!
//!                    POST /api/payment/callback (gateway calls us)
//!  callback ───────  body: base64(PaymentStateReport)
//!                    X-VERIFY: sha256(body + salt) ### index
//!
//!                    GET {base}/pg/v1/status/{merchantId}/{txId}
//!  status poll ────  X-VERIFY: sha256("" + path + salt) ### index
//!                    ◀─ PaymentStateReport
//! ```
//!
//! The module is transport and signing only. What a report means for the
//! ledger is decided by the orchestrator.

mod checksum;
mod client;
mod types;

pub use checksum::{compute_checksum, verify_checksum};
pub use client::{GatewayClient, PAY_PATH, STATUS_PATH_PREFIX, status_path};
pub use types::{
    GatewayError, GatewayResult, PayResponse, PaymentStateData, PaymentStateReport,
};
