//! Centralized pricing policy for credit-metered features.
//!
//! Single source of truth for what each generation action costs and
//! which credit balance it draws from. Everything here is pure: no
//! clock, no store, no configuration. Handlers price an action, then
//! hand the result to the ledger for the actual debit.
//!
//! # Cost rules
//!
//! | Action             | Cost                                  |
//! |--------------------|---------------------------------------|
//! | Text to Speech Pro | 1 credit per character of input text  |
//! | Voice Cloning Pro  | 1 credit per character of spoken text |
//! | Talking Image      | 1 credit per started 10s of audio     |

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Audio seconds covered by one talking-image credit.
pub const TALKING_IMAGE_SECONDS_PER_CREDIT: f64 = 10.0;

#[derive(Error, Debug, PartialEq)]
pub enum PricingError {
    /// Action or product name outside the supported set
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    /// Media duration that cannot be priced (non-positive or non-finite)
    #[error("Invalid media duration: {0}")]
    InvalidDuration(f64),
}

/// The three credit balances an account holds.
///
/// Serialized names match the product names shown to users; the same
/// strings key the ledger's balance rows and arrive in purchase
/// payloads as `productName`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreditKind {
    #[serde(rename = "Text to Speech Pro")]
    TextToSpeechPro,
    #[serde(rename = "Voice Cloning Pro")]
    VoiceCloningPro,
    #[serde(rename = "Talking Image")]
    TalkingImage,
}

impl CreditKind {
    pub const ALL: [CreditKind; 3] = [
        CreditKind::TextToSpeechPro,
        CreditKind::VoiceCloningPro,
        CreditKind::TalkingImage,
    ];

    pub fn product_name(&self) -> &'static str {
        match self {
            CreditKind::TextToSpeechPro => "Text to Speech Pro",
            CreditKind::VoiceCloningPro => "Voice Cloning Pro",
            CreditKind::TalkingImage => "Talking Image",
        }
    }

    /// Parse an exact product name. Matching is case-sensitive: these
    /// strings travel through payment payloads and a near-miss should
    /// surface as an error, not silently grant a different balance.
    pub fn from_product_name(name: &str) -> Result<Self, PricingError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.product_name() == name)
            .ok_or_else(|| PricingError::UnsupportedAction(name.to_string()))
    }

    /// Credits granted to this balance when an account is created.
    pub fn signup_grant(&self) -> i64 {
        match self {
            CreditKind::TextToSpeechPro => 1000,
            CreditKind::VoiceCloningPro => 1000,
            CreditKind::TalkingImage => 0,
        }
    }
}

impl fmt::Display for CreditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.product_name())
    }
}

/// A priceable generation request.
#[derive(Debug, Clone, Copy)]
pub enum UsageAction<'a> {
    /// Synthesize speech from text
    TextToSpeech { text: &'a str },
    /// Speak text with a cloned voice
    VoiceClone { text: &'a str },
    /// Animate a still image to spoken audio of the given length
    TalkingImage { duration_seconds: f64 },
}

impl UsageAction<'_> {
    /// The balance this action debits.
    pub fn credit_kind(&self) -> CreditKind {
        match self {
            UsageAction::TextToSpeech { .. } => CreditKind::TextToSpeechPro,
            UsageAction::VoiceClone { .. } => CreditKind::VoiceCloningPro,
            UsageAction::TalkingImage { .. } => CreditKind::TalkingImage,
        }
    }
}

/// Credits required for an action.
///
/// Character costs count Unicode scalar values, not bytes, so text in
/// any script prices the way users perceive its length.
pub fn cost(action: &UsageAction) -> Result<i64, PricingError> {
    match action {
        UsageAction::TextToSpeech { text } | UsageAction::VoiceClone { text } => {
            Ok(text.chars().count() as i64)
        }
        UsageAction::TalkingImage { duration_seconds } => {
            if !duration_seconds.is_finite() || *duration_seconds <= 0.0 {
                return Err(PricingError::InvalidDuration(*duration_seconds));
            }
            Ok((duration_seconds / TALKING_IMAGE_SECONDS_PER_CREDIT).ceil() as i64)
        }
    }
}
