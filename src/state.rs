//! Shared application state

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::ledger::LedgerStore;
use crate::core::orchestrator::CreditOrchestrator;
use crate::core::speech::SpeechBackend;
use crate::errors::app_error::{AppError, AppResult};

/// State threaded through every route via `State<Arc<AppState>>`.
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub ledger: LedgerStore,
    pub orchestrator: Arc<CreditOrchestrator>,
    /// Absent when `SPEECH_API_URL` is unset; generation routes then
    /// answer with a configuration error before touching the ledger.
    pub speech: Option<Arc<dyn SpeechBackend>>,
}

impl AppState {
    pub fn new(
        config: Arc<ServerConfig>,
        ledger: LedgerStore,
        orchestrator: Arc<CreditOrchestrator>,
        speech: Option<Arc<dyn SpeechBackend>>,
    ) -> Self {
        Self {
            config,
            ledger,
            orchestrator,
            speech,
        }
    }

    /// Inference backend, required by the generation routes.
    pub fn speech_backend(&self) -> AppResult<&dyn SpeechBackend> {
        self.speech.as_deref().ok_or_else(|| {
            AppError::ServerConfiguration(
                "Speech backend not configured (SPEECH_API_URL)".to_string(),
            )
        })
    }
}
