//! Voice cloning handler.

use axum::{
    extract::{Extension, State},
    response::Json,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::auth::Auth;
use crate::core::pricing::UsageAction;
use crate::core::speech::{self, SpeechBackend as _};
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

/// Request body for POST /voices/clone.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneVoiceRequest {
    /// Text to speak in the cloned voice; one credit per character
    pub text: String,
    /// Base64-encoded reference recording (WAV)
    pub audio_data: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

/// Handler for POST /voices/clone - Speak text in the voice of a
/// reference recording.
///
/// Charges Voice Cloning credits (one per character of `text`) before
/// calling the inference backend.
///
/// # Request Body
///
/// ```json
/// {
///   "text": "Hello in my own voice",
///   "audioData": "<base64 WAV>",
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
pub async fn clone_voice(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    Json(request): Json<CloneVoiceRequest>,
) -> AppResult<Json<Value>> {
    let account_id = auth.account_id()?;

    if request.text.trim().is_empty() {
        return Err(AppError::InvalidPayload("text cannot be empty".to_string()));
    }
    let reference_audio = BASE64
        .decode(&request.audio_data)
        .map_err(|e| AppError::InvalidPayload(format!("audioData is not valid base64: {e}")))?;
    if reference_audio.is_empty() {
        return Err(AppError::InvalidPayload(
            "audioData decodes to nothing".to_string(),
        ));
    }

    // Resolve the backend before charging so a configuration problem
    // never costs the caller credits.
    let backend = state.speech_backend()?;

    let action = UsageAction::VoiceClone {
        text: &request.text,
    };
    state.orchestrator.charge_for_usage(account_id, &action)?;

    let audio_data = backend
        .clone_voice(speech::VoiceCloneRequest {
            text: request.text,
            reference_audio,
            language: request.language,
        })
        .await?;

    Ok(Json(json!({ "audioData": audio_data })))
}
