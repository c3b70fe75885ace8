//! Gemini adapter — JSON `generateContent` request with inline base64 audio.
//!
//! Gemini has no dedicated transcription endpoint; the adapter sends the
//! WAV artifact as an `inlineData` part next to a fixed instruction prompt.
//! The prompt declares the no-speech sentinel so silence comes back as a
//! distinguishable token instead of hallucinated text.
//!
//! This is the one provider with live model discovery: `GET /models`
//! returns the full catalog, which is filtered down to entries that
//! support `generateContent` and carry `"gemini"` in their name (the
//! audio-capable subset).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::audio::AudioArtifact;

use super::{
    ModelEntry, ProviderError, ProviderId, TranscriptionOutcome, TranscriptionProvider,
    NO_SPEECH_SENTINEL,
};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Instruction sent alongside the audio. Declares the sentinel.
const TRANSCRIBE_PROMPT: &str = "Transcribe the speech in this audio recording verbatim. \
Return only the transcribed text, with no commentary or formatting. \
If the recording contains no discernible speech, reply with exactly NO_SPEECH_DETECTED.";

/// Speaks Gemini's `generateContent` wire contract.
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl TranscriptionProvider for GeminiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn validate_key(&self, key: &str) -> bool {
        let url = format!("{}/models", self.base_url);
        match self
            .client
            .get(&url)
            .header("x-goog-api-key", key)
            .query(&[("pageSize", "1")])
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!("gemini: key probe failed: {e}");
                false
            }
        }
    }

    async fn list_models(&self, key: &str) -> Vec<ModelEntry> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", key)
            .query(&[("pageSize", "200")])
            .send()
            .await;

        let json: Value = match response {
            Ok(r) if r.status().is_success() => match r.json().await {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("gemini: model catalog parse failed, using defaults: {e}");
                    return self.default_models();
                }
            },
            Ok(r) => {
                log::warn!(
                    "gemini: model catalog request returned {}, using defaults",
                    r.status()
                );
                return self.default_models();
            }
            Err(e) => {
                log::warn!("gemini: model catalog request failed, using defaults: {e}");
                return self.default_models();
            }
        };

        let models = parse_model_catalog(&json);
        if models.is_empty() {
            // A valid key must never produce an empty catalog.
            self.default_models()
        } else {
            models
        }
    }

    fn default_models(&self) -> Vec<ModelEntry> {
        vec![
            ModelEntry::new("gemini-2.0-flash", "Gemini 2.0 Flash"),
            ModelEntry::new("gemini-1.5-flash", "Gemini 1.5 Flash"),
            ModelEntry::new("gemini-1.5-pro", "Gemini 1.5 Pro"),
        ]
    }

    async fn transcribe(
        &self,
        artifact: &AudioArtifact,
        model: &str,
        key: &str,
    ) -> Result<TranscriptionOutcome, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let body = json!({
            "contents": [{
                "parts": [
                    { "text": TRANSCRIBE_PROMPT },
                    {
                        "inlineData": {
                            "mimeType": artifact.mime,
                            "data": BASE64.encode(&artifact.bytes)
                        }
                    }
                ]
            }]
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&body)
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

/// Filter the `GET /models` catalog down to audio-capable entries.
///
/// An entry qualifies when `supportedGenerationMethods` contains
/// `"generateContent"` and the model name contains `"gemini"`. The
/// `models/` prefix is stripped from ids.
fn parse_model_catalog(json: &Value) -> Vec<ModelEntry> {
    let Some(models) = json.get("models").and_then(Value::as_array) else {
        return Vec::new();
    };

    models
        .iter()
        .filter_map(|m| {
            let name = m.get("name").and_then(Value::as_str)?;
            let methods = m
                .get("supportedGenerationMethods")
                .and_then(Value::as_array)?;
            let supports_generate = methods
                .iter()
                .any(|v| v.as_str() == Some("generateContent"));
            if !supports_generate || !name.contains("gemini") {
                return None;
            }

            let id = name.strip_prefix("models/").unwrap_or(name);
            let display = m
                .get("displayName")
                .and_then(Value::as_str)
                .unwrap_or(id);
            Some(ModelEntry::new(id, display))
        })
        .collect()
}

/// Extract the transcript from Gemini's candidate envelope.
fn parse_transcription(json: &Value) -> Result<TranscriptionOutcome, ProviderError> {
    let text = json
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str);

    if let Some(text) = text {
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog(entries: Value) -> Value {
        json!({ "models": entries })
    }

    #[test]
    fn catalog_keeps_generate_content_gemini_models() {
        let json = catalog(json!([
            {
                "name": "models/gemini-2.0-flash",
                "displayName": "Gemini 2.0 Flash",
                "supportedGenerationMethods": ["generateContent", "countTokens"]
            },
            {
                "name": "models/text-embedding-004",
                "displayName": "Text Embedding",
                "supportedGenerationMethods": ["embedContent"]
            },
            {
                "name": "models/aqa",
                "displayName": "AQA",
                "supportedGenerationMethods": ["generateAnswer"]
            }
        ]));

        let models = parse_model_catalog(&json);
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, "gemini-2.0-flash");
        assert_eq!(models[0].display_name, "Gemini 2.0 Flash");
    }

    #[test]
    fn catalog_strips_models_prefix() {
        let json = catalog(json!([
            {
                "name": "models/gemini-1.5-pro",
                "supportedGenerationMethods": ["generateContent"]
            }
        ]));
        let models = parse_model_catalog(&json);
        assert_eq!(models[0].id, "gemini-1.5-pro");
        // No displayName in the entry; id doubles as display.
        assert_eq!(models[0].display_name, "gemini-1.5-pro");
    }

    #[test]
    fn catalog_without_models_field_is_empty() {
        assert!(parse_model_catalog(&json!({})).is_empty());
        assert!(parse_model_catalog(&json!({ "models": "wrong" })).is_empty());
    }

    #[test]
    fn parses_candidate_text() {
        let json = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "ein Satz" }] }
            }]
        });
        assert_eq!(
            parse_transcription(&json).unwrap(),
            TranscriptionOutcome::Text("ein Satz".into())
        );
    }

    #[test]
    fn sentinel_reply_is_no_speech() {
        let json = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "NO_SPEECH_DETECTED" }] }
            }]
        });
        assert_eq!(
            parse_transcription(&json).unwrap(),
            TranscriptionOutcome::NoSpeech
        );
    }

    #[test]
    fn error_envelope_is_rejected() {
        let json = json!({
            "error": { "code": 400, "message": "unsupported mime type" }
        });
        match parse_transcription(&json) {
            Err(ProviderError::Rejected(msg)) => assert_eq!(msg, "unsupported mime type"),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn empty_envelope_is_unexpected() {
        assert!(matches!(
            parse_transcription(&json!({})),
            Err(ProviderError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn default_catalog_is_non_empty() {
        let provider = GeminiProvider::new(reqwest::Client::new());
        assert!(!provider.default_models().is_empty());
    }
}
