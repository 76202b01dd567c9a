//! Speech backend trait and error taxonomy.

use async_trait::async_trait;
use thiserror::Error;

/// Result type for inference backend operations
pub type SpeechResult<T> = Result<T, SpeechError>;

/// Errors from the inference backend
#[derive(Error, Debug)]
pub enum SpeechError {
    /// Network failure, timeout, non-2xx answer, or an unparseable body
    #[error("Speech backend unavailable: {0}")]
    Unavailable(String),

    /// The backend understood the request and declined it
    #[error("Speech backend rejected the request: {0}")]
    Rejected(String),

    /// The backend answered without a media reference
    #[error("Speech backend returned no media in the result")]
    MissingMedia,

    /// The generated media could not be downloaded
    #[error("Failed to fetch generated media: {0}")]
    MediaFetch(String),
}

/// Text-to-speech request
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    /// Named preset voice; the backend's default when absent
    pub voice: Option<String>,
    pub language: String,
}

/// Voice cloning request. The reference audio is raw WAV bytes.
#[derive(Debug, Clone)]
pub struct VoiceCloneRequest {
    pub text: String,
    pub reference_audio: Vec<u8>,
    pub language: String,
}

/// Talking-image request. Raw image bytes plus raw WAV bytes.
#[derive(Debug, Clone)]
pub struct TalkingImageRequest {
    pub image: Vec<u8>,
    pub audio: Vec<u8>,
}

/// Generation backend behind the usage routes.
///
/// Every method resolves to a `data:` URI with the media inlined, which
/// is what the HTTP surface hands back to clients. Implementations are
/// opaque remote services; nothing in the crate inspects the media
/// beyond the duration check the talking-image route performs on its
/// input audio.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Renders text to speech. Returns a `data:audio/wav;base64,` URI.
    async fn synthesize(&self, request: SynthesisRequest) -> SpeechResult<String>;

    /// Renders text in the voice of the reference audio.
    async fn clone_voice(&self, request: VoiceCloneRequest) -> SpeechResult<String>;

    /// Animates a portrait image with the given speech audio. Returns a
    /// `data:video/mp4;base64,` URI.
    async fn animate_image(&self, request: TalkingImageRequest) -> SpeechResult<String>;
}
