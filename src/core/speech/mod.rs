//! Inference backend for speech synthesis, voice cloning, and talking
//! images.
//!
//! The usage routes charge credits first and only then reach this
//! module, so implementations never see a request the ledger has not
//! already paid for.

mod remote;
mod types;

pub use remote::{RemoteSpeechClient, data_uri};
pub use types::{
    SpeechBackend, SpeechError, SpeechResult, SynthesisRequest, TalkingImageRequest,
    VoiceCloneRequest,
};
