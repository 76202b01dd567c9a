//! Ledger records, the transaction status lifecycle, and the error
//! taxonomy shared by the store and its callers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::core::pricing::CreditKind;

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    /// No account row for the given id
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Account id already registered
    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    /// Debit would push the balance below zero
    #[error("{kind} balance too low: required {required}, available {available}")]
    InsufficientBalance {
        kind: CreditKind,
        required: i64,
        available: i64,
    },

    /// Negative amount passed to a balance mutation
    #[error("Amount must be non-negative, got {0}")]
    InvalidAmount(i64),

    /// Transaction id already recorded somewhere in the system
    #[error("Duplicate transaction id: {0}")]
    DuplicateTransactionId(String),

    /// No transaction row for the given id
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    /// Status change outside `pending -> success` / `pending -> failed`
    #[error("Transaction {id} is {from}, cannot mark {to}")]
    InvalidTransition {
        id: String,
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// Underlying SQLite failure
    #[error("Ledger storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Status of a purchase transaction.
///
/// `Pending` is the only non-terminal state. Terminal states are
/// absorbing: a transaction that reached `Success` or `Failed` never
/// changes again, and re-applying the same terminal state is treated
/// as a retry rather than a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Recorded at initiation, waiting for the gateway outcome
    Pending,
    /// Gateway confirmed the payment, credits granted
    Success,
    /// Gateway reported failure, no credits granted
    Failed,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub(crate) fn from_str(s: &str) -> Self {
        match s {
            "success" => Self::Success,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchase transaction as recorded by the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    /// Gateway-scoped transaction id (`merchantTransactionId` on the
    /// wire), unique across the whole system
    pub transaction_id: String,
    /// Account the purchase belongs to
    pub account_id: String,
    /// Merchant id the purchase was initiated under
    pub merchant_id: String,
    /// Purchase amount in major currency units
    pub amount: i64,
    pub status: TransactionStatus,
    /// Credits granted when the purchase succeeds
    pub credits: i64,
    /// Balance the credits land in; `None` for zero-credit purchases
    pub credit_kind: Option<CreditKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// A fresh `pending` record stamped with the current time.
    pub fn pending(
        transaction_id: impl Into<String>,
        account_id: impl Into<String>,
        merchant_id: impl Into<String>,
        amount: i64,
        credits: i64,
        credit_kind: Option<CreditKind>,
    ) -> Self {
        let now = Utc::now();
        Self {
            transaction_id: transaction_id.into(),
            account_id: account_id.into(),
            merchant_id: merchant_id.into(),
            amount,
            status: TransactionStatus::Pending,
            credits,
            credit_kind,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What `settle_purchase` did with a gateway-reported outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Status flipped and any credits granted in this call
    Applied,
    /// Transaction was already in the reported terminal status
    AlreadySettled,
    /// Transaction is terminal with a different status than reported
    Conflicting { recorded: TransactionStatus },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Success,
            TransactionStatus::Failed,
        ] {
            assert_eq!(TransactionStatus::from_str(status.as_str()), status);
        }
    }

    #[test]
    fn test_unrecognized_status_reads_as_pending() {
        assert_eq!(
            TransactionStatus::from_str("completed"),
            TransactionStatus::Pending
        );
    }

    #[test]
    fn test_only_pending_is_non_terminal() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Success.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
    }

    #[test]
    fn test_pending_record_defaults() {
        let record = TransactionRecord::pending(
            "MT1",
            "acct-1",
            "MERCHANT",
            499,
            2000,
            Some(CreditKind::TextToSpeechPro),
        );
        assert_eq!(record.status, TransactionStatus::Pending);
        assert_eq!(record.amount, 499);
        assert_eq!(record.created_at, record.updated_at);
    }
}
