//! Talking-image handler.
//!
//! The cost of an animation is one credit per started 10-second block
//! of speech audio, so the duration is derived server-side from the
//! uploaded WAV header rather than taken from the client.

use axum::{
    extract::{Extension, State},
    response::Json,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};
use std::io::Cursor;
use std::sync::Arc;

use crate::auth::Auth;
use crate::core::pricing::UsageAction;
use crate::core::speech::{self, SpeechBackend as _};
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

/// Request body for POST /talking-image.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TalkingImageRequest {
    /// Base64-encoded portrait image
    pub image_data: String,
    /// Base64-encoded speech audio (WAV); its duration sets the cost
    pub audio_data: String,
}

/// Handler for POST /talking-image - Animate a portrait to speech.
///
/// Charges Talking Image credits (one per started 10 seconds of audio)
/// before calling the inference backend. Audio that is not a decodable
/// WAV, or that contains no samples, answers 400 without charging.
///
/// # Request Body
///
/// ```json
/// {
///   "imageData": "<base64 PNG or JPEG>",
///   "audioData": "<base64 WAV>"
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "videoData": "data:video/mp4;base64,..."
/// }
/// ```
pub async fn talking_image(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    Json(request): Json<TalkingImageRequest>,
) -> AppResult<Json<Value>> {
    let account_id = auth.account_id()?;

    let image = BASE64
        .decode(&request.image_data)
        .map_err(|e| AppError::InvalidPayload(format!("imageData is not valid base64: {e}")))?;
    if image.is_empty() {
        return Err(AppError::InvalidPayload(
            "imageData decodes to nothing".to_string(),
        ));
    }
    let audio = BASE64
        .decode(&request.audio_data)
        .map_err(|e| AppError::InvalidPayload(format!("audioData is not valid base64: {e}")))?;

    let duration_seconds = wav_duration_seconds(&audio)?;

    // Resolve the backend before charging so a configuration problem
    // never costs the caller credits.
    let backend = state.speech_backend()?;

    let action = UsageAction::TalkingImage { duration_seconds };
    state.orchestrator.charge_for_usage(account_id, &action)?;

    let video_data = backend
        .animate_image(speech::TalkingImageRequest { image, audio })
        .await?;

    Ok(Json(json!({ "videoData": video_data })))
}

/// Playback length of a WAV file, from its header.
fn wav_duration_seconds(bytes: &[u8]) -> AppResult<f64> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| AppError::InvalidPayload(format!("audioData is not a readable WAV: {e}")))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(AppError::InvalidPayload(
            "audioData reports a zero sample rate".to_string(),
        ));
    }
    Ok(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(channels: u16, sample_rate: u32, frames: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..frames * u32::from(channels) {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_wav_duration_from_header() {
        let bytes = wav_bytes(1, 16000, 8000);
        let duration = wav_duration_seconds(&bytes).unwrap();
        assert!((duration - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_wav_duration_counts_frames_not_samples() {
        // Stereo: interleaved samples, but duration follows frames.
        let bytes = wav_bytes(2, 8000, 4000);
        let duration = wav_duration_seconds(&bytes).unwrap();
        assert!((duration - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        let result = wav_duration_seconds(b"not a wav file at all");
        assert!(matches!(result, Err(AppError::InvalidPayload(_))));
    }

    #[test]
    fn test_truncated_wav_is_rejected() {
        let mut bytes = wav_bytes(1, 16000, 8000);
        bytes.truncate(10);
        let result = wav_duration_seconds(&bytes);
        assert!(matches!(result, Err(AppError::InvalidPayload(_))));
    }

    #[test]
    fn test_talking_image_request_field_names_are_camel_case() {
        let request: TalkingImageRequest =
            serde_json::from_str(r#"{"imageData": "aW1n", "audioData": "UklGRg=="}"#).unwrap();
        assert_eq!(request.image_data, "aW1n");
        assert_eq!(request.audio_data, "UklGRg==");
    }
}
