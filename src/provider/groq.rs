//! Groq adapter — multipart upload to Groq's OpenAI-compatible endpoint.
//!
//! Same request family as the OpenAI adapter, with two differences: the
//! base URL, and a fixed `language` hint sent with every request.

use async_trait::async_trait;
use reqwest::multipart;
use serde_json::Value;

use crate::audio::AudioArtifact;

use super::{
    ModelEntry, ProviderError, ProviderId, TranscriptionOutcome, TranscriptionProvider,
    NO_SPEECH_SENTINEL,
};

const BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Fixed language hint sent with every transcription request.
const LANGUAGE_HINT: &str = "en";

/// Speaks Groq's (OpenAI-compatible) audio transcription wire contract.
pub struct GroqProvider {
    client: reqwest::Client,
    base_url: String,
}

impl GroqProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl TranscriptionProvider for GroqProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Groq
    }

    async fn validate_key(&self, key: &str) -> bool {
        let url = format!("{}/models", self.base_url);
        match self.client.get(&url).bearer_auth(key).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!("groq: key probe failed: {e}");
                false
            }
        }
    }

    async fn list_models(&self, _key: &str) -> Vec<ModelEntry> {
        self.default_models()
    }

    fn default_models(&self) -> Vec<ModelEntry> {
        vec![
            ModelEntry::new("whisper-large-v3-turbo", "Whisper Large v3 Turbo"),
            ModelEntry::new("whisper-large-v3", "Whisper Large v3"),
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
            .text("model", model.to_string())
            .text("language", LANGUAGE_HINT);

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

/// Extract the transcript from Groq's `{ "text": … }` envelope.
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
