use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use kaiwa_core::errors::CollaboratorError;
use kaiwa_core::provider::SpeechSynthesizer;
use kaiwa_core::voice::VoiceProfile;

const API_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Google Cloud Text-to-Speech client. Always MP3; voice picked from the
/// two fixed profiles.
pub struct GoogleTts {
    client: Client,
    api_key: SecretString,
}

impl GoogleTts {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            api_key,
        }
    }
}

pub(crate) fn build_request_body(text: &str, voice: VoiceProfile) -> serde_json::Value {
    serde_json::json!({
        "input": {"text": text},
        "voice": {
            "languageCode": voice.language_code(),
            "name": voice.voice_name(),
        },
        "audioConfig": {
            "audioEncoding": "MP3",
            "pitch": 0.0,
            "speakingRate": 1.0,
        },
    })
}

#[derive(Deserialize)]
struct SynthesizeResponse {
    #[serde(rename = "audioContent", default)]
    audio_content: String,
}

pub(crate) fn decode_audio(response: SynthesizeResponse) -> Result<Vec<u8>, CollaboratorError> {
    if response.audio_content.is_empty() {
        return Err(CollaboratorError::EmptyOutput);
    }
    base64::engine::general_purpose::STANDARD
        .decode(&response.audio_content)
        .map_err(|e| CollaboratorError::NetworkError(format!("invalid audio payload: {e}")))
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    fn name(&self) -> &str {
        "google-tts"
    }

    #[instrument(skip(self, text), fields(voice = voice.voice_name(), chars = text.len()))]
    async fn synthesize(
        &self,
        text: &str,
        voice: VoiceProfile,
    ) -> Result<Vec<u8>, CollaboratorError> {
        let body = build_request_body(text, voice);

        let resp = self
            .client
            .post(API_URL)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(CollaboratorError::from_status(status, body));
        }

        let parsed: SynthesizeResponse = resp
            .json()
            .await
            .map_err(|e| CollaboratorError::NetworkError(format!("malformed response: {e}")))?;

        decode_audio(parsed)
    }
}
