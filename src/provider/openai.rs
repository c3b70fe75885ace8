//! OpenAI adapter — multipart upload to `/v1/audio/transcriptions`.
//!
//! Key validation probes `GET /v1/models` with Bearer auth. The model
//! catalog is a static curated list: OpenAI's `/v1/models` listing mixes
//! chat, embedding and image models with no reliable way to tell which
//! accept audio, so live discovery buys nothing here.

use async_trait::async_trait;
use reqwest::multipart;
use serde_json::Value;

use crate::audio::AudioArtifact;

use super::{
    ModelEntry, ProviderError, ProviderId, TranscriptionOutcome, TranscriptionProvider,
    NO_SPEECH_SENTINEL,
};

const BASE_URL: &str = "https://api.openai.com/v1";

/// Speaks OpenAI's audio transcription wire contract.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl TranscriptionProvider for OpenAiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    async fn validate_key(&self, key: &str) -> bool {
        let url = format!("{}/models", self.base_url);
        match self.client.get(&url).bearer_auth(key).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!("openai: key probe failed: {e}");
                false
            }
        }
    }

    async fn list_models(&self, _key: &str) -> Vec<ModelEntry> {
        self.default_models()
    }

    fn default_models(&self) -> Vec<ModelEntry> {
        vec![
            ModelEntry::new("whisper-1", "Whisper v2 (whisper-1)"),
            ModelEntry::new("gpt-4o-transcribe", "GPT-4o Transcribe"),
            ModelEntry::new("gpt-4o-mini-transcribe", "GPT-4o mini Transcribe"),
        ]
    }

    async fn transcribe(
        &self,
        artifact: &AudioArtifact,
        model: &str,
        key: &str,
    ) -> Result<TranscriptionOutcome, ProviderError> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        let file = multipart::Part::bytes(artifact.bytes.clone())
            .file_name("recording.wav")
            .mime_str(artifact.mime)
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let form = multipart::Form::new()
            .part("file", file)
            .text("model", model.to_string());

        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::AuthInvalid);
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        parse_transcription(&json)
    }
}

/// Extract the transcript from OpenAI's `{ "text": … }` envelope.
///
/// Envelope rules: a `text` field equal to the no-speech sentinel or empty
/// after trimming means silence; a missing `text` with an `error` object is
/// a provider-rejected request; neither field is an unexpected response.
fn parse_transcription(json: &Value) -> Result<TranscriptionOutcome, ProviderError> {
    if let Some(text) = json.get("text").and_then(Value::as_str) {
        let text = text.trim();
        if text.is_empty() || text == NO_SPEECH_SENTINEL {
            return Ok(TranscriptionOutcome::NoSpeech);
        }
        return Ok(TranscriptionOutcome::Text(text.to_string()));
    }

    if let Some(error) = json.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unspecified error");
        return Err(ProviderError::Rejected(message.to_string()));
    }

    Err(ProviderError::UnexpectedResponse(json.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
