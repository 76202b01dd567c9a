//! Remote inference client.
//!
//! Speaks a two-step contract: a predict call that answers with a media
//! URL, then a download of that URL. The media is inlined into a `data:`
//! URI so clients never touch the backend directly.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::types::{
    SpeechBackend, SpeechError, SpeechResult, SynthesisRequest, TalkingImageRequest,
    VoiceCloneRequest,
};

const TTS_ENDPOINT: &str = "/tts";
const CLONE_ENDPOINT: &str = "/clone_voice";
const TALKING_IMAGE_ENDPOINT: &str = "/talking_image";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("EchoVoice-Server/", env!("CARGO_PKG_VERSION"));

/// Predict answers carry the generated media as a URL reference.
#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    data: Vec<MediaRef>,
}

#[derive(Debug, Deserialize)]
struct MediaRef {
    #[serde(default)]
    url: Option<String>,
}

/// HTTP client for the hosted inference service.
///
/// Generation runs for tens of seconds on cold models, so the request
/// timeout is generous; the caller has already been charged by the time
/// a call starts, and a timeout surfaces as a backend failure rather
/// than a hung request.
pub struct RemoteSpeechClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl RemoteSpeechClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> SpeechResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SpeechError::Unavailable(format!("Failed to create HTTP client: {e}")))?;

        let base = base_url.into();
        Ok(Self {
            http_client,
            base_url: base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Runs one predict call and returns the media URL it points at.
    async fn predict(&self, endpoint: &str, inputs: Value) -> SpeechResult<String> {
        let url = format!("{}/predict{}", self.base_url, endpoint);
        debug!(%url, "Calling inference backend");

        let mut request = self.http_client.post(&url).json(&inputs);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SpeechError::Unavailable(format!("Predict request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            SpeechError::Unavailable(format!("Failed to read predict response: {e}"))
        })?;

        if !status.is_success() {
            let detail = error_detail(&body).unwrap_or_else(|| "no detail".to_string());
            if status.is_client_error() {
                return Err(SpeechError::Rejected(detail));
            }
            return Err(SpeechError::Unavailable(format!(
                "Backend answered {status}: {detail}"
            )));
        }

        let parsed: PredictResponse = serde_json::from_str(&body)
            .map_err(|e| SpeechError::Unavailable(format!("Unparseable predict response: {e}")))?;

        parsed
            .data
            .into_iter()
            .find_map(|media| media.url)
            .ok_or(SpeechError::MissingMedia)
    }

    async fn download(&self, url: &str) -> SpeechResult<Vec<u8>> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| SpeechError::MediaFetch(format!("Media request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::MediaFetch(format!(
                "Media host answered {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SpeechError::MediaFetch(format!("Failed to read media body: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn generate(&self, endpoint: &str, inputs: Value, mime: &str) -> SpeechResult<String> {
        let media_url = self.predict(endpoint, inputs).await?;
        let media = self.download(&media_url).await?;
        debug!(endpoint, bytes = media.len(), "Inference media downloaded");
        Ok(data_uri(mime, &media))
    }
}

#[async_trait]
impl SpeechBackend for RemoteSpeechClient {
    async fn synthesize(&self, request: SynthesisRequest) -> SpeechResult<String> {
        let mut inputs = json!({
            "text": request.text,
            "language": request.language,
        });
        if let Some(voice) = request.voice {
            inputs["voice"] = Value::String(voice);
        }
        self.generate(TTS_ENDPOINT, inputs, "audio/wav").await
    }

    async fn clone_voice(&self, request: VoiceCloneRequest) -> SpeechResult<String> {
        let inputs = json!({
            "text": request.text,
            "audio_file": file_input("reference.wav", "audio/wav", &request.reference_audio),
            "language": request.language,
        });
        self.generate(CLONE_ENDPOINT, inputs, "audio/wav").await
    }

    async fn animate_image(&self, request: TalkingImageRequest) -> SpeechResult<String> {
        let inputs = json!({
            "image": file_input("portrait.png", "image/png", &request.image),
            "audio": file_input("speech.wav", "audio/wav", &request.audio),
        });
        self.generate(TALKING_IMAGE_ENDPOINT, inputs, "video/mp4")
            .await
    }
}

/// Inlines a media payload as a base64 `data:` URI.
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

/// File inputs travel as named data URIs, the shape the backend's file
/// widgets accept.
fn file_input(name: &str, mime: &str, bytes: &[u8]) -> Value {
    json!({ "name": name, "data": data_uri(mime, bytes) })
}

fn error_detail(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|parsed| parsed.error)
}
