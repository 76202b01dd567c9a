//! Credit ledger backed by embedded SQLite.
//!
//! Persists per-account balances for every credit kind plus an
//! append-only purchase transaction history. Purchases move through a
//! small status lifecycle:
//!
//! ```text
//! pending ----> success   (credits granted atomically with the flip)
//!    |
//!    +--------> failed    (no balance mutation)
//! ```
//!
//! Both terminal states are absorbing, and re-applying the same terminal
//! state is a no-op so retried gateway callbacks stay idempotent. The
//! success flip and the credit grant happen inside one SQL transaction;
//! an interrupted settlement can never leave credits granted against a
//! still-pending row.

mod store;
mod types;

pub use store::LedgerStore;
pub use types::{
    LedgerError, LedgerResult, SettleOutcome, TransactionRecord, TransactionStatus,
};
