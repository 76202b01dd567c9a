//! Text-to-speech handler.

use axum::{
    extract::{Extension, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::auth::Auth;
use crate::core::pricing::UsageAction;
use crate::core::speech::{self, SpeechBackend as _};
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

/// Request body for POST /speak.
#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    /// Text to synthesize; one credit per character
    pub text: String,
    /// Named preset voice; the backend picks its default when absent
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

/// Handler for POST /speak - Synthesize speech from text.
///
/// Charges Text to Speech credits (one per character) before calling
/// the inference backend. A failed charge leaves the backend untouched.
///
/// # Request Body
///
/// ```json
/// {
///   "text": "Hello world",
///   "voice": "alloy",
///   "language": "en"
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "audioData": "data:audio/wav;base64,..."
/// }
/// ```
pub async fn speak(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    Json(request): Json<SpeakRequest>,
) -> AppResult<Json<Value>> {
    let account_id = auth.account_id()?;

    if request.text.trim().is_empty() {
        return Err(AppError::InvalidPayload("text cannot be empty".to_string()));
    }

    // Resolve the backend before charging so a configuration problem
    // never costs the caller credits.
    let backend = state.speech_backend()?;

    let action = UsageAction::TextToSpeech {
        text: &request.text,
    };
    state.orchestrator.charge_for_usage(account_id, &action)?;

    let audio_data = backend
        .synthesize(speech::SynthesisRequest {
            text: request.text,
            voice: request.voice,
            language: request.language,
        })
        .await?;

    Ok(Json(json!({ "audioData": audio_data })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speak_request_defaults() {
        let request: SpeakRequest = serde_json::from_str(r#"{"text": "hi"}"#).unwrap();
        assert_eq!(request.text, "hi");
        assert_eq!(request.voice, None);
        assert_eq!(request.language, "en");
    }

    #[test]
    fn test_speak_request_explicit_fields() {
        let request: SpeakRequest =
            serde_json::from_str(r#"{"text": "hi", "voice": "alloy", "language": "hi"}"#).unwrap();
        assert_eq!(request.voice.as_deref(), Some("alloy"));
        assert_eq!(request.language, "hi");
    }
}
