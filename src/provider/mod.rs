//! Transcription provider abstraction.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │           TranscriptionProvider (trait)                │
//! │                                                        │
//! │   validate_key(key)  → bool                            │
//! │   list_models(key)   → Vec<ModelEntry>  (never empty)  │
//! │   transcribe(wav, model, key) → Text | NoSpeech | Err  │
//! │                                                        │
//! │   OpenAiProvider    multipart file+model               │
//! │   GroqProvider      multipart file+model+language      │
//! │   GeminiProvider    JSON + base64 inline audio         │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! Dispatch is by the closed [`ProviderId`] enum through a
//! [`ProviderFactory`] — no string comparisons at call sites. Each adapter
//! owns the full wire contract of one provider: request shape, response
//! envelope, key-validation probe, and model catalog.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::AudioArtifact;

pub mod gemini;
pub mod groq;
pub mod openai;

pub use gemini::GeminiProvider;
pub use groq::GroqProvider;
pub use openai::OpenAiProvider;

// ---------------------------------------------------------------------------
// ProviderId
// ---------------------------------------------------------------------------

/// The closed set of supported transcription providers.
///
/// Serialised as `"openai" | "groq" | "gemini"` — these strings are part of
/// the persisted store layout and must not change.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenAi,
    Groq,
    Gemini,
}

impl ProviderId {
    /// All providers, in display order.
    pub const ALL: [ProviderId; 3] = [ProviderId::OpenAi, ProviderId::Groq, ProviderId::Gemini];

    /// Stable identifier used as a store key.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::Groq => "groq",
            ProviderId::Gemini => "gemini",
        }
    }

    /// Human-readable name for logs and display.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "OpenAI",
            ProviderId::Groq => "Groq",
            ProviderId::Gemini => "Gemini",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ProviderId::OpenAi),
            "groq" => Ok(ProviderId::Groq),
            "gemini" => Ok(ProviderId::Gemini),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// A provider selection outside the closed set — only reachable through a
/// corrupted or hand-edited store file.
#[derive(Debug, Clone, Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

// ---------------------------------------------------------------------------
// ModelEntry
// ---------------------------------------------------------------------------

/// One entry of a provider's model catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Identifier sent on the wire (e.g. `"whisper-1"`).
    pub id: String,
    /// Human-readable name for display.
    pub display_name: String,
}

impl ModelEntry {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptionOutcome
// ---------------------------------------------------------------------------

/// Sentinel string a provider returns when the recording contains no
/// discernible speech. Distinct from an empty response (whisper-family
/// endpoints emit empty text on silence) and from transport errors.
pub const NO_SPEECH_SENTINEL: &str = "NO_SPEECH_DETECTED";

/// Successful result of a transcription request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionOutcome {
    /// A non-empty transcript.
    Text(String),
    /// The provider heard no speech in the recording.
    NoSpeech,
}

// ---------------------------------------------------------------------------
// ProviderError
// ---------------------------------------------------------------------------

/// Classified failures of a provider request.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// 401/403 or a provider-declared invalid-key response.
    #[error("API key was rejected by the provider")]
    AuthInvalid,

    /// Network failure or a response body that was not valid JSON.
    #[error("request failed: {0}")]
    Transport(String),

    /// The provider returned a well-formed error envelope.
    #[error("provider rejected the request: {0}")]
    Rejected(String),

    /// The response parsed as JSON but matched no known envelope shape.
    #[error("unexpected response shape: {0}")]
    UnexpectedResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Transport(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// TranscriptionProvider trait
// ---------------------------------------------------------------------------

/// Uniform capability interface over the three provider wire contracts.
///
/// Implementations are `Send + Sync` and object-safe so the coordinator can
/// hold them behind `Box<dyn TranscriptionProvider>`.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Which provider this adapter speaks for.
    fn id(&self) -> ProviderId;

    /// Lightweight authenticated probe against the provider's models
    /// endpoint. Any 2xx means the key is valid; network or parse failures
    /// map to `false`, never to an error.
    async fn validate_key(&self, key: &str) -> bool;

    /// The provider's model catalog — live discovery where the provider
    /// supports it, otherwise the static curated list.
    ///
    /// Never returns an empty vector: any failure falls back to
    /// [`default_models`](Self::default_models).
    async fn list_models(&self, key: &str) -> Vec<ModelEntry>;

    /// Static default catalog. The first entry is the model used when no
    /// explicit selection has been persisted.
    fn default_models(&self) -> Vec<ModelEntry>;

    /// Send one finished recording for transcription.
    async fn transcribe(
        &self,
        artifact: &AudioArtifact,
        model: &str,
        key: &str,
    ) -> Result<TranscriptionOutcome, ProviderError>;
}

// Compile-time assertion: Box<dyn TranscriptionProvider> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn TranscriptionProvider>) {}
};

// ---------------------------------------------------------------------------
// ProviderFactory
// ---------------------------------------------------------------------------

/// Creates the adapter for a given [`ProviderId`].
///
/// The indirection exists so the coordinator can be tested against mock
/// providers without any network access.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, id: ProviderId) -> Box<dyn TranscriptionProvider>;
}

/// Production factory — one shared `reqwest::Client` across all adapters.
pub struct HttpProviderFactory {
    client: reqwest::Client,
}

impl HttpProviderFactory {
    /// Build a factory with a default client. Request timeouts are the
    /// reqwest defaults; the user waits for completion or failure.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn create(&self, id: ProviderId) -> Box<dyn TranscriptionProvider> {
        match id {
            ProviderId::OpenAi => Box::new(OpenAiProvider::new(self.client.clone())),
            ProviderId::Groq => Box::new(GroqProvider::new(self.client.clone())),
            ProviderId::Gemini => Box::new(GeminiProvider::new(self.client.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// Mock implementations (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scriptable provider for coordinator tests.
    #[derive(Clone)]
    pub struct MockProvider {
        pub provider_id: ProviderId,
        pub key_valid: bool,
        pub models: Vec<ModelEntry>,
        pub result: Result<TranscriptionOutcome, ProviderError>,
        /// Number of `transcribe` calls observed, shared across clones.
        pub transcribe_calls: Arc<AtomicUsize>,
    }

    impl MockProvider {
        pub fn ok(text: &str) -> Self {
            Self::with_result(Ok(TranscriptionOutcome::Text(text.to_string())))
        }

        pub fn no_speech() -> Self {
            Self::with_result(Ok(TranscriptionOutcome::NoSpeech))
        }

        pub fn failing(err: ProviderError) -> Self {
            Self::with_result(Err(err))
        }

        pub fn with_result(result: Result<TranscriptionOutcome, ProviderError>) -> Self {
            Self {
                provider_id: ProviderId::OpenAi,
                key_valid: true,
                models: vec![ModelEntry::new("mock-1", "Mock Model")],
                result,
                transcribe_calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn calls(&self) -> usize {
            self.transcribe_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TranscriptionProvider for MockProvider {
        fn id(&self) -> ProviderId {
            self.provider_id
        }

        async fn validate_key(&self, _key: &str) -> bool {
            self.key_valid
        }

        async fn list_models(&self, _key: &str) -> Vec<ModelEntry> {
            self.models.clone()
        }

        fn default_models(&self) -> Vec<ModelEntry> {
            self.models.clone()
        }

        async fn transcribe(
            &self,
            _artifact: &AudioArtifact,
            _model: &str,
            _key: &str,
        ) -> Result<TranscriptionOutcome, ProviderError> {
            self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    /// Factory that hands out clones of one scripted provider.
    pub struct MockFactory(pub MockProvider);

    impl ProviderFactory for MockFactory {
        fn create(&self, _id: ProviderId) -> Box<dyn TranscriptionProvider> {
            Box::new(self.0.clone())
        }
    }
}

#[cfg(test)]
pub use mock::{MockFactory, MockProvider};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn provider_id_round_trips_through_str() {
        for id in ProviderId::ALL {
            assert_eq!(ProviderId::from_str(id.as_str()).unwrap(), id);
        }
    }

    #[test]
    fn unknown_provider_string_is_an_error() {
        assert!(ProviderId::from_str("azure").is_err());
        assert!(ProviderId::from_str("").is_err());
    }

    #[test]
    fn provider_id_serde_uses_lowercase_strings() {
        assert_eq!(
            serde_json::to_string(&ProviderId::OpenAi).unwrap(),
            "\"openai\""
        );
        let parsed: ProviderId = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(parsed, ProviderId::Gemini);
    }

    #[test]
    fn factory_dispatches_all_variants() {
        let factory = HttpProviderFactory::new();
        for id in ProviderId::ALL {
            assert_eq!(factory.create(id).id(), id);
        }
    }

    #[test]
    fn default_catalogs_are_never_empty() {
        let factory = HttpProviderFactory::new();
        for id in ProviderId::ALL {
            assert!(!factory.create(id).default_models().is_empty());
        }
    }
}
