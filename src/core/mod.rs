pub mod gateway;
pub mod ledger;
pub mod orchestrator;
pub mod pricing;
pub mod reconcile;
pub mod speech;

// Re-export commonly used types for convenience
pub use gateway::{
    GatewayClient, GatewayError, GatewayResult, PaymentStateReport, compute_checksum,
    verify_checksum,
};

pub use ledger::{
    LedgerError, LedgerResult, LedgerStore, SettleOutcome, TransactionRecord, TransactionStatus,
};

pub use orchestrator::{CallbackOutcome, ChargedUsage, CreditOrchestrator, InitiatedPurchase};

pub use pricing::{CreditKind, PricingError, UsageAction, cost};

pub use reconcile::Reconciler;

pub use speech::{
    RemoteSpeechClient, SpeechBackend, SpeechError, SpeechResult, SynthesisRequest,
    TalkingImageRequest, VoiceCloneRequest,
};
