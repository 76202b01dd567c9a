//! SQLite-backed ledger store.
//!
//! One connection per process behind a `parking_lot` mutex. Every public
//! method takes the lock for a single statement or one explicit SQL
//! transaction and releases it before returning; nothing here is async,
//! so the guard never lives across an await point. Balance checks and
//! decrements are a single conditional `UPDATE`, which keeps debits
//! atomic even against a second process on the same database file.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::core::pricing::CreditKind;

use super::types::{
    LedgerError, LedgerResult, SettleOutcome, TransactionRecord, TransactionStatus,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    account_id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS balances (
    account_id  TEXT NOT NULL,
    credit_kind TEXT NOT NULL,
    balance     INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0),
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (account_id, credit_kind)
);

CREATE TABLE IF NOT EXISTS transactions (
    transaction_id TEXT PRIMARY KEY,
    account_id     TEXT NOT NULL,
    merchant_id    TEXT NOT NULL,
    amount         INTEGER NOT NULL,
    status         TEXT NOT NULL DEFAULT 'pending',
    credits        INTEGER NOT NULL DEFAULT 0,
    product_name   TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id);
CREATE INDEX IF NOT EXISTS idx_transactions_status ON transactions(status);
";

const TRANSACTION_COLUMNS: &str = "transaction_id, account_id, merchant_id, amount, status, \
                                   credits, product_name, created_at, updated_at";

/// Persistent credit ledger.
///
/// Cloning is cheap; all clones share one SQLite connection.
#[derive(Clone)]
pub struct LedgerStore {
    conn: Arc<Mutex<Connection>>,
}

impl LedgerStore {
    /// Opens (or creates) the ledger database at `path` and applies the
    /// schema. WAL mode keeps readers unblocked during settlement writes.
    pub fn open<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn)
    }

    /// In-memory ledger for benchmarks and tests.
    pub fn open_in_memory() -> LedgerResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> LedgerResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an account and seeds every credit balance with its signup
    /// grant, all in one SQL transaction.
    pub fn create_account(&self, account_id: &str) -> LedgerResult<()> {
        let now = timestamp(Utc::now());
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        match tx.execute(
            "INSERT INTO accounts (account_id, created_at) VALUES (?1, ?2)",
            params![account_id, now],
        ) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(LedgerError::DuplicateAccount(account_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        for kind in CreditKind::ALL {
            tx.execute(
                "INSERT INTO balances (account_id, credit_kind, balance, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![account_id, kind.product_name(), kind.signup_grant(), now],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Current balance for one credit kind.
    pub fn balance(&self, account_id: &str, kind: CreditKind) -> LedgerResult<i64> {
        let conn = self.conn.lock();
        ensure_account(&conn, account_id)?;
        read_balance(&conn, account_id, kind)
    }

    /// All balances for an account, one entry per credit kind.
    pub fn balances(&self, account_id: &str) -> LedgerResult<HashMap<CreditKind, i64>> {
        let conn = self.conn.lock();
        ensure_account(&conn, account_id)?;

        let mut map = HashMap::with_capacity(CreditKind::ALL.len());
        for kind in CreditKind::ALL {
            map.insert(kind, read_balance(&conn, account_id, kind)?);
        }
        Ok(map)
    }

    /// Removes `amount` credits, failing without mutation when the balance
    /// would go negative. Check and decrement are a single conditional
    /// `UPDATE`, so concurrent debits on the same account and kind can
    /// never jointly overdraw. Returns the new balance.
    pub fn debit(&self, account_id: &str, kind: CreditKind, amount: i64) -> LedgerResult<i64> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let now = timestamp(Utc::now());
        let conn = self.conn.lock();

        let updated = conn.execute(
            "UPDATE balances SET balance = balance - ?3, updated_at = ?4
             WHERE account_id = ?1 AND credit_kind = ?2 AND balance >= ?3",
            params![account_id, kind.product_name(), amount, now],
        )?;

        if updated == 0 {
            ensure_account(&conn, account_id)?;
            let available = read_balance(&conn, account_id, kind)?;
            return Err(LedgerError::InsufficientBalance {
                kind,
                required: amount,
                available,
            });
        }

        read_balance(&conn, account_id, kind)
    }

    /// Adds `amount` credits, creating the balance row if this kind has
    /// never been touched. Returns the new balance.
    pub fn credit(&self, account_id: &str, kind: CreditKind, amount: i64) -> LedgerResult<i64> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let now = timestamp(Utc::now());
        let conn = self.conn.lock();
        ensure_account(&conn, account_id)?;
        apply_credit(&conn, account_id, kind, amount, &now)?;
        read_balance(&conn, account_id, kind)
    }

    /// Records a new purchase transaction. Transaction ids are globally
    /// unique; a reused id fails before any state changes.
    pub fn append_transaction(&self, record: &TransactionRecord) -> LedgerResult<()> {
        let conn = self.conn.lock();
        ensure_account(&conn, &record.account_id)?;

        let result = conn.execute(
            "INSERT INTO transactions
                 (transaction_id, account_id, merchant_id, amount, status,
                  credits, product_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.transaction_id,
                record.account_id,
                record.merchant_id,
                record.amount,
                record.status.as_str(),
                record.credits,
                record.credit_kind.map(|kind| kind.product_name()),
                timestamp(record.created_at),
                timestamp(record.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(LedgerError::DuplicateTransactionId(
                    record.transaction_id.clone(),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Looks up a transaction by id.
    pub fn get_transaction(&self, transaction_id: &str) -> LedgerResult<Option<TransactionRecord>> {
        let conn = self.conn.lock();
        read_transaction(&conn, transaction_id)
    }

    /// Applies a status transition. Only `pending -> success` and
    /// `pending -> failed` mutate; re-applying the current terminal status
    /// is an idempotent no-op, and every other transition is rejected.
    pub fn update_transaction_status(
        &self,
        transaction_id: &str,
        new_status: TransactionStatus,
    ) -> LedgerResult<()> {
        let now = timestamp(Utc::now());
        let conn = self.conn.lock();

        let record = read_transaction(&conn, transaction_id)?
            .ok_or_else(|| LedgerError::UnknownTransaction(transaction_id.to_string()))?;

        if !new_status.is_terminal() {
            return Err(invalid_transition(transaction_id, record.status, new_status));
        }
        if record.status == new_status {
            return Ok(());
        }
        if record.status.is_terminal() {
            return Err(invalid_transition(transaction_id, record.status, new_status));
        }

        let updated = conn.execute(
            "UPDATE transactions SET status = ?2, updated_at = ?3
             WHERE transaction_id = ?1 AND status = 'pending'",
            params![transaction_id, new_status.as_str(), now],
        )?;

        if updated == 0 {
            // Raced with another writer on the same database file.
            let current = read_transaction(&conn, transaction_id)?
                .ok_or_else(|| LedgerError::UnknownTransaction(transaction_id.to_string()))?;
            if current.status == new_status {
                return Ok(());
            }
            return Err(invalid_transition(transaction_id, current.status, new_status));
        }

        Ok(())
    }

    /// Applies a gateway-reported outcome: flips `pending -> success` and
    /// grants the recorded credits in one SQL transaction, or flips
    /// `pending -> failed` with no balance change. Terminal transactions
    /// are left untouched and reported through the returned outcome, so a
    /// retried success callback cannot grant credits twice.
    pub fn settle_purchase(
        &self,
        transaction_id: &str,
        reported: TransactionStatus,
    ) -> LedgerResult<SettleOutcome> {
        let now = timestamp(Utc::now());
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let record = read_transaction(&tx, transaction_id)?
            .ok_or_else(|| LedgerError::UnknownTransaction(transaction_id.to_string()))?;

        if !reported.is_terminal() {
            return Err(invalid_transition(transaction_id, record.status, reported));
        }
        if record.status == reported {
            return Ok(SettleOutcome::AlreadySettled);
        }
        if record.status.is_terminal() {
            return Ok(SettleOutcome::Conflicting {
                recorded: record.status,
            });
        }

        let updated = tx.execute(
            "UPDATE transactions SET status = ?2, updated_at = ?3
             WHERE transaction_id = ?1 AND status = 'pending'",
            params![transaction_id, reported.as_str(), now],
        )?;

        if updated == 0 {
            // Raced with another writer on the same database file.
            let current = read_transaction(&tx, transaction_id)?
                .ok_or_else(|| LedgerError::UnknownTransaction(transaction_id.to_string()))?;
            if current.status == reported {
                return Ok(SettleOutcome::AlreadySettled);
            }
            return Ok(SettleOutcome::Conflicting {
                recorded: current.status,
            });
        }

        if reported == TransactionStatus::Success && record.credits > 0 {
            if let Some(kind) = record.credit_kind {
                apply_credit(&tx, &record.account_id, kind, record.credits, &now)?;
            }
        }

        tx.commit()?;
        Ok(SettleOutcome::Applied)
    }

    /// Pending transactions created at least `min_age` ago, oldest first.
    /// Feed for the reconciliation sweep.
    pub fn stale_pending_transactions(
        &self,
        min_age: Duration,
    ) -> LedgerResult<Vec<TransactionRecord>> {
        let cutoff = timestamp(Utc::now() - min_age);
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             WHERE status = 'pending' AND created_at <= ?1
             ORDER BY created_at"
        ))?;
        let records = stmt
            .query_map(params![cutoff], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn ensure_account(conn: &Connection, account_id: &str) -> LedgerResult<()> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM accounts WHERE account_id = ?1",
            params![account_id],
            |_| Ok(()),
        )
        .optional()?;
    if exists.is_none() {
        return Err(LedgerError::AccountNotFound(account_id.to_string()));
    }
    Ok(())
}

fn read_balance(conn: &Connection, account_id: &str, kind: CreditKind) -> LedgerResult<i64> {
    let balance = conn
        .query_row(
            "SELECT balance FROM balances WHERE account_id = ?1 AND credit_kind = ?2",
            params![account_id, kind.product_name()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(balance.unwrap_or(0))
}

fn apply_credit(
    conn: &Connection,
    account_id: &str,
    kind: CreditKind,
    amount: i64,
    now: &str,
) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO balances (account_id, credit_kind, balance, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(account_id, credit_kind) DO UPDATE SET
             balance = balance + ?3,
             updated_at = ?4",
        params![account_id, kind.product_name(), amount, now],
    )?;
    Ok(())
}

fn read_transaction(
    conn: &Connection,
    transaction_id: &str,
) -> LedgerResult<Option<TransactionRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE transaction_id = ?1"),
            params![transaction_id],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<TransactionRecord> {
    let status: String = row.get(4)?;
    let product_name: Option<String> = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(TransactionRecord {
        transaction_id: row.get(0)?,
        account_id: row.get(1)?,
        merchant_id: row.get(2)?,
        amount: row.get(3)?,
        status: TransactionStatus::from_str(&status),
        credits: row.get(5)?,
        credit_kind: product_name
            .as_deref()
            .and_then(|name| CreditKind::from_product_name(name).ok()),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn invalid_transition(
    id: &str,
    from: TransactionStatus,
    to: TransactionStatus,
) -> LedgerError {
    LedgerError::InvalidTransition {
        id: id.to_string(),
        from,
        to,
    }
}

// Whole-second RFC 3339 with a trailing Z: fixed width, so lexicographic
// comparison in SQL matches chronological order.
fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (LedgerStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = LedgerStore::open(dir.path().join("ledger.db")).unwrap();
        (store, dir)
    }

    fn pending_purchase(id: &str, credits: i64, kind: Option<CreditKind>) -> TransactionRecord {
        TransactionRecord::pending(id, "acct-1", "MERCHANT", 499, credits, kind)
    }

    #[test]
    fn test_create_account_seeds_signup_grants() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();

        let balances = store.balances("acct-1").unwrap();
        assert_eq!(balances[&CreditKind::TextToSpeechPro], 1000);
        assert_eq!(balances[&CreditKind::VoiceCloningPro], 1000);
        assert_eq!(balances[&CreditKind::TalkingImage], 0);
    }

    #[test]
    fn test_create_account_twice_rejected() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();

        let err = store.create_account("acct-1").unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateAccount(_)));
    }

    #[test]
    fn test_balance_for_unknown_account() {
        let (store, _dir) = test_store();
        let err = store
            .balance("ghost", CreditKind::TextToSpeechPro)
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(_)));
    }

    #[test]
    fn test_debit_decrements_and_returns_new_balance() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();

        let new_balance = store
            .debit("acct-1", CreditKind::TextToSpeechPro, 237)
            .unwrap();
        assert_eq!(new_balance, 763);
        assert_eq!(
            store.balance("acct-1", CreditKind::TextToSpeechPro).unwrap(),
            763
        );
    }

    #[test]
    fn test_debit_overdraft_rejected_not_clamped() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();

        let err = store
            .debit("acct-1", CreditKind::VoiceCloningPro, 1500)
            .unwrap_err();
        match err {
            LedgerError::InsufficientBalance {
                required,
                available,
                ..
            } => {
                assert_eq!(required, 1500);
                assert_eq!(available, 1000);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            store.balance("acct-1", CreditKind::VoiceCloningPro).unwrap(),
            1000
        );
    }

    #[test]
    fn test_debit_entire_balance_allowed() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();

        let new_balance = store
            .debit("acct-1", CreditKind::TextToSpeechPro, 1000)
            .unwrap();
        assert_eq!(new_balance, 0);
    }

    #[test]
    fn test_debit_negative_amount_rejected() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();

        let err = store
            .debit("acct-1", CreditKind::TextToSpeechPro, -5)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(-5)));
    }

    #[test]
    fn test_concurrent_debits_never_overdraw() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();
        store
            .debit("acct-1", CreditKind::TextToSpeechPro, 500)
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                store
                    .debit("acct-1", CreditKind::TextToSpeechPro, 100)
                    .is_ok()
            }));
        }
        let successes = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|succeeded| *succeeded)
            .count();

        // 500 credits left, 8 debits of 100 attempted.
        assert_eq!(successes, 5);
        assert_eq!(
            store.balance("acct-1", CreditKind::TextToSpeechPro).unwrap(),
            0
        );
    }

    #[test]
    fn test_credit_accumulates() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();

        assert_eq!(store.credit("acct-1", CreditKind::TalkingImage, 30).unwrap(), 30);
        assert_eq!(store.credit("acct-1", CreditKind::TalkingImage, 12).unwrap(), 42);
    }

    #[test]
    fn test_credit_unknown_account() {
        let (store, _dir) = test_store();
        let err = store
            .credit("ghost", CreditKind::TalkingImage, 10)
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(_)));
    }

    #[test]
    fn test_append_duplicate_transaction_id_rejected() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();

        let record = pending_purchase("MT1", 2000, Some(CreditKind::TextToSpeechPro));
        store.append_transaction(&record).unwrap();

        let err = store.append_transaction(&record).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateTransactionId(id) if id == "MT1"));
    }

    #[test]
    fn test_append_requires_account() {
        let (store, _dir) = test_store();
        let record = pending_purchase("MT1", 0, None);
        let err = store.append_transaction(&record).unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(_)));
    }

    #[test]
    fn test_pending_to_terminal_transitions() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();
        store
            .append_transaction(&pending_purchase("MT1", 0, None))
            .unwrap();
        store
            .append_transaction(&pending_purchase("MT2", 0, None))
            .unwrap();

        store
            .update_transaction_status("MT1", TransactionStatus::Success)
            .unwrap();
        store
            .update_transaction_status("MT2", TransactionStatus::Failed)
            .unwrap();

        let mt1 = store.get_transaction("MT1").unwrap().unwrap();
        let mt2 = store.get_transaction("MT2").unwrap().unwrap();
        assert_eq!(mt1.status, TransactionStatus::Success);
        assert_eq!(mt2.status, TransactionStatus::Failed);
    }

    #[test]
    fn test_reapplying_terminal_status_is_noop() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();
        store
            .append_transaction(&pending_purchase("MT1", 0, None))
            .unwrap();

        store
            .update_transaction_status("MT1", TransactionStatus::Success)
            .unwrap();
        store
            .update_transaction_status("MT1", TransactionStatus::Success)
            .unwrap();

        let record = store.get_transaction("MT1").unwrap().unwrap();
        assert_eq!(record.status, TransactionStatus::Success);
    }

    #[test]
    fn test_conflicting_terminal_status_rejected() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();
        store
            .append_transaction(&pending_purchase("MT1", 0, None))
            .unwrap();
        store
            .update_transaction_status("MT1", TransactionStatus::Success)
            .unwrap();

        let err = store
            .update_transaction_status("MT1", TransactionStatus::Failed)
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidTransition {
                from: TransactionStatus::Success,
                to: TransactionStatus::Failed,
                ..
            }
        ));
    }

    #[test]
    fn test_transition_to_pending_rejected() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();
        store
            .append_transaction(&pending_purchase("MT1", 0, None))
            .unwrap();

        let err = store
            .update_transaction_status("MT1", TransactionStatus::Pending)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));
    }

    #[test]
    fn test_update_unknown_transaction() {
        let (store, _dir) = test_store();
        let err = store
            .update_transaction_status("ghost", TransactionStatus::Success)
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownTransaction(_)));
    }

    #[test]
    fn test_settle_success_credits_exactly_once() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();
        store
            .append_transaction(&pending_purchase("MT1", 2000, Some(CreditKind::TextToSpeechPro)))
            .unwrap();

        let outcome = store
            .settle_purchase("MT1", TransactionStatus::Success)
            .unwrap();
        assert_eq!(outcome, SettleOutcome::Applied);
        assert_eq!(
            store.balance("acct-1", CreditKind::TextToSpeechPro).unwrap(),
            3000
        );

        // Gateway retries the callback.
        let outcome = store
            .settle_purchase("MT1", TransactionStatus::Success)
            .unwrap();
        assert_eq!(outcome, SettleOutcome::AlreadySettled);
        assert_eq!(
            store.balance("acct-1", CreditKind::TextToSpeechPro).unwrap(),
            3000
        );
    }

    #[test]
    fn test_settle_failed_leaves_balances() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();
        store
            .append_transaction(&pending_purchase("MT1", 2000, Some(CreditKind::TextToSpeechPro)))
            .unwrap();

        let outcome = store
            .settle_purchase("MT1", TransactionStatus::Failed)
            .unwrap();
        assert_eq!(outcome, SettleOutcome::Applied);
        assert_eq!(
            store.balance("acct-1", CreditKind::TextToSpeechPro).unwrap(),
            1000
        );
        let record = store.get_transaction("MT1").unwrap().unwrap();
        assert_eq!(record.status, TransactionStatus::Failed);
    }

    #[test]
    fn test_settle_conflicting_report() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();
        store
            .append_transaction(&pending_purchase("MT1", 2000, Some(CreditKind::TextToSpeechPro)))
            .unwrap();
        store
            .settle_purchase("MT1", TransactionStatus::Failed)
            .unwrap();

        let outcome = store
            .settle_purchase("MT1", TransactionStatus::Success)
            .unwrap();
        assert_eq!(
            outcome,
            SettleOutcome::Conflicting {
                recorded: TransactionStatus::Failed
            }
        );
        // The conflicting success report must not grant anything.
        assert_eq!(
            store.balance("acct-1", CreditKind::TextToSpeechPro).unwrap(),
            1000
        );
        let record = store.get_transaction("MT1").unwrap().unwrap();
        assert_eq!(record.status, TransactionStatus::Failed);
    }

    #[test]
    fn test_settle_unknown_transaction() {
        let (store, _dir) = test_store();
        let err = store
            .settle_purchase("ghost", TransactionStatus::Success)
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownTransaction(_)));
    }

    #[test]
    fn test_settle_zero_credit_purchase() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();
        store
            .append_transaction(&pending_purchase("MT1", 0, None))
            .unwrap();

        let outcome = store
            .settle_purchase("MT1", TransactionStatus::Success)
            .unwrap();
        assert_eq!(outcome, SettleOutcome::Applied);

        let balances = store.balances("acct-1").unwrap();
        assert_eq!(balances[&CreditKind::TextToSpeechPro], 1000);
        assert_eq!(balances[&CreditKind::VoiceCloningPro], 1000);
        assert_eq!(balances[&CreditKind::TalkingImage], 0);
    }

    #[test]
    fn test_stale_pending_transactions() {
        let (store, _dir) = test_store();
        store.create_account("acct-1").unwrap();
        store
            .append_transaction(&pending_purchase("MT1", 0, None))
            .unwrap();
        store
            .append_transaction(&pending_purchase("MT2", 0, None))
            .unwrap();
        store
            .settle_purchase("MT1", TransactionStatus::Success)
            .unwrap();

        let stale = store.stale_pending_transactions(Duration::zero()).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].transaction_id, "MT2");

        let stale = store.stale_pending_transactions(Duration::hours(1)).unwrap();
        assert!(stale.is_empty());
    }
}
