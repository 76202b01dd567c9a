//! Initialization helpers for preparing the ledger before starting the
//! EchoVoice server.
//!
//! This module hosts the logic that powers the `echovoice-server create-account`
//! CLI command. The command opens the ledger database, inserts the account row,
//! and seeds every credit balance with its signup grant, so the account can
//! authenticate and spend before any purchase has settled.
//!
//! Typical usage from the CLI:
//!
//! ```text
//! $ DATABASE_PATH=/var/lib/echovoice/ledger.db echovoice-server create-account --account-id alice
//! ```

use anyhow::{Context, Result, anyhow};

use crate::config::ServerConfig;
use crate::core::ledger::LedgerStore;
use crate::core::pricing::CreditKind;

/// Create a ledger account seeded with the signup credit grants.
pub fn run(account_id: &str) -> Result<()> {
    let config = ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?;

    let ledger = LedgerStore::open(&config.database_path).with_context(|| {
        format!(
            "failed to open ledger database at {}",
            config.database_path.display()
        )
    })?;

    ledger
        .create_account(account_id)
        .with_context(|| format!("failed to create account `{account_id}`"))?;

    tracing::info!(account_id, "Created account");
    for kind in CreditKind::ALL {
        tracing::info!(kind = %kind, granted = kind.signup_grant(), "Seeded signup balance");
    }

    Ok(())
}
