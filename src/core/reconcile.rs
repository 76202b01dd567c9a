//! Background reconciliation of stale pending purchases.
//!
//! Callbacks get lost. A server restart or a gateway outage can leave a
//! purchase `pending` forever while the payer was already charged. The
//! reconciler sweeps such rows on an interval and asks the gateway's
//! status endpoint what actually happened, settling through the same
//! atomic path callbacks use. Rows younger than the minimum age are left
//! alone so the sweep never races a callback that is still in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::core::ledger::LedgerStore;
use crate::core::orchestrator::{CallbackOutcome, CreditOrchestrator};
use crate::errors::app_error::AppError;

pub struct Reconciler {
    orchestrator: Arc<CreditOrchestrator>,
    ledger: LedgerStore,
    sweep_interval: Duration,
    min_age: chrono::Duration,
}

impl Reconciler {
    pub fn new(
        orchestrator: Arc<CreditOrchestrator>,
        ledger: LedgerStore,
        sweep_interval_seconds: u64,
        min_age_seconds: u64,
    ) -> Self {
        Self {
            orchestrator,
            ledger,
            sweep_interval: Duration::from_secs(sweep_interval_seconds),
            min_age: chrono::Duration::seconds(min_age_seconds as i64),
        }
    }

    /// Spawns the sweep loop. The first tick fires immediately, so a
    /// restart reconciles whatever the previous process left behind.
    pub fn spawn(self) -> JoinHandle<()> {
        info!(
            interval_seconds = self.sweep_interval.as_secs(),
            min_age_seconds = self.min_age.num_seconds(),
            "Starting payment reconciler"
        );
        tokio::spawn(async move {
            let mut ticker = interval(self.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sweep().await;
            }
        })
    }

    /// One pass over the stale pending transactions.
    pub async fn sweep(&self) {
        let stale = match self.ledger.stale_pending_transactions(self.min_age) {
            Ok(stale) => stale,
            Err(e) => {
                warn!(error = %e, "Failed to list stale pending transactions");
                return;
            }
        };
        if stale.is_empty() {
            debug!("No stale pending transactions to reconcile");
            return;
        }

        info!(count = stale.len(), "Reconciling stale pending transactions");
        for record in stale {
            match self.orchestrator.reconcile_transaction(&record).await {
                Ok(CallbackOutcome::Applied(status)) => {
                    info!(
                        merchant_transaction_id = %record.transaction_id,
                        status = %status,
                        "Reconciled stale purchase"
                    );
                }
                Ok(CallbackOutcome::StillPending) => {
                    debug!(
                        merchant_transaction_id = %record.transaction_id,
                        "Gateway still reports the purchase pending"
                    );
                }
                Ok(outcome) => {
                    debug!(
                        merchant_transaction_id = %record.transaction_id,
                        ?outcome,
                        "Reconciliation found nothing to settle"
                    );
                }
                Err(AppError::GatewayUnavailable(e)) => {
                    // The rest of the pass would fail the same way.
                    warn!(
                        merchant_transaction_id = %record.transaction_id,
                        error = %e,
                        "Gateway unreachable, leaving remaining rows for the next sweep"
                    );
                    break;
                }
                Err(e) => {
                    warn!(
                        merchant_transaction_id = %record.transaction_id,
                        error = %e,
                        "Failed to reconcile transaction"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::{SaltKey, ServerConfig};
    use crate::core::gateway::GatewayClient;
    use crate::core::ledger::{TransactionRecord, TransactionStatus};
    use crate::core::pricing::CreditKind;

    fn sweep_setup(gateway_url: &str) -> (Reconciler, LedgerStore) {
        let config = Arc::new(ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            tls: None,
            public_base_url: "https://echovoice.example".to_string(),
            database_path: PathBuf::from(":memory:"),
            payment_gateway_base_url: Some(gateway_url.to_string()),
            payment_merchant_id: Some("MERCHANT1".to_string()),
            payment_salt_key: Some(SaltKey::new("test-salt-key".to_string())),
            payment_salt_index: "1".to_string(),
            speech_api_url: None,
            speech_api_key: None,
            auth_api_secrets: Vec::new(),
            auth_required: false,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            reconcile_interval_seconds: 300,
            reconcile_min_age_seconds: 0,
        });
        let ledger = LedgerStore::open_in_memory().expect("in-memory store");
        ledger.create_account("acct-1").expect("account created");
        let gateway = GatewayClient::new(Duration::from_secs(5)).expect("client builds");
        let orchestrator = Arc::new(CreditOrchestrator::new(config, ledger.clone(), gateway));
        // min_age 0 makes every pending row immediately stale
        let reconciler = Reconciler::new(orchestrator, ledger.clone(), 300, 0);
        (reconciler, ledger)
    }

    fn seed_pending(ledger: &LedgerStore, tx_id: &str, credits: i64) {
        ledger
            .append_transaction(&TransactionRecord::pending(
                tx_id,
                "acct-1",
                "MERCHANT1",
                499,
                credits,
                Some(CreditKind::TextToSpeechPro),
            ))
            .expect("pending recorded");
    }

    fn status_response(tx_id: &str, code: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "success": code == "PAYMENT_SUCCESS",
            "code": code,
            "data": { "merchantTransactionId": tx_id }
        }))
    }

    #[tokio::test]
    async fn test_sweep_settles_stale_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pg/v1/status/MERCHANT1/MT1"))
            .respond_with(status_response("MT1", "PAYMENT_SUCCESS"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pg/v1/status/MERCHANT1/MT2"))
            .respond_with(status_response("MT2", "PAYMENT_ERROR"))
            .expect(1)
            .mount(&server)
            .await;

        let (reconciler, ledger) = sweep_setup(&server.uri());
        seed_pending(&ledger, "MT1", 500);
        seed_pending(&ledger, "MT2", 700);

        reconciler.sweep().await;

        assert_eq!(
            ledger
                .get_transaction("MT1")
                .expect("lookup succeeds")
                .expect("record exists")
                .status,
            TransactionStatus::Success
        );
        assert_eq!(
            ledger
                .get_transaction("MT2")
                .expect("lookup succeeds")
                .expect("record exists")
                .status,
            TransactionStatus::Failed
        );
        // Only the successful purchase granted its credits
        assert_eq!(
            ledger
                .balance("acct-1", CreditKind::TextToSpeechPro)
                .expect("balance reads"),
            1500
        );
    }

    #[tokio::test]
    async fn test_sweep_leaves_pending_when_gateway_says_so() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pg/v1/status/MERCHANT1/MT1"))
            .respond_with(status_response("MT1", "PAYMENT_PENDING"))
            .mount(&server)
            .await;

        let (reconciler, ledger) = sweep_setup(&server.uri());
        seed_pending(&ledger, "MT1", 500);

        reconciler.sweep().await;

        assert_eq!(
            ledger
                .get_transaction("MT1")
                .expect("lookup succeeds")
                .expect("record exists")
                .status,
            TransactionStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_sweep_survives_unreachable_gateway() {
        let (reconciler, ledger) = sweep_setup("http://127.0.0.1:1");
        seed_pending(&ledger, "MT1", 500);

        reconciler.sweep().await;

        assert_eq!(
            ledger
                .get_transaction("MT1")
                .expect("lookup succeeds")
                .expect("record exists")
                .status,
            TransactionStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_sweep_ignores_young_pending_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(status_response("MT1", "PAYMENT_SUCCESS"))
            .expect(0)
            .mount(&server)
            .await;

        let (reconciler, ledger) = {
            let (base, ledger) = sweep_setup(&server.uri());
            // Rebuild with a fifteen-minute minimum age
            let reconciler = Reconciler::new(base.orchestrator, ledger.clone(), 300, 900);
            (reconciler, ledger)
        };
        seed_pending(&ledger, "MT1", 500);

        reconciler.sweep().await;

        assert_eq!(
            ledger
                .get_transaction("MT1")
                .expect("lookup succeeds")
                .expect("record exists")
                .status,
            TransactionStatus::Pending
        );
    }
}
