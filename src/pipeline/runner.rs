//! Trigger coordinator — the state machine both entry points go through.
//!
//! # Flow
//!
//! ```text
//! toggle()
//!   ├─ Idle         → start(): cooldown gate → key check → open microphone
//!   ├─ Recording    → stop():  release microphone → transcribe → merge
//!   └─ Transcribing → ignored (idempotent no-op)
//! ```
//!
//! Collaborators are injected as trait objects so the whole cycle runs in
//! tests with no audio hardware and no network. Provider id, key and model
//! are read from the registry at the moment of use, never captured earlier;
//! a key saved while the hotkey callback already existed is picked up by
//! the very next trigger.
//!
//! Every path out of `Transcribing` ends in `Idle`: success, no-speech,
//! and every failure class alike.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::audio::{AudioArtifact, CaptureBackend, TARGET_SAMPLE_RATE};
use crate::config::TriggerConfig;
use crate::history::HistoryStore;
use crate::provider::{ProviderError, ProviderFactory, TranscriptionOutcome};
use crate::registry::SharedRegistry;

use super::state::{DictationState, NoticeKind, SharedState};

// ---------------------------------------------------------------------------
// ToggleOutcome
// ---------------------------------------------------------------------------

/// Structured result of a trigger. Callers branch on this, never on the
/// buffer text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// A recording started.
    Started,
    /// A recording finished and transcription completed (see the status).
    Finished(TranscriptStatus),
    /// The start was refused before any capture began.
    Rejected(NoticeKind),
    /// The signal was absorbed (cooldown, or a phase that ignores it).
    Ignored,
}

/// How a completed transcription cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptStatus {
    /// The transcript was merged into the buffer.
    Merged(String),
    /// The provider heard no speech.
    NoSpeech,
    /// The cycle failed; the kind says why.
    Failed(NoticeKind),
}

// ---------------------------------------------------------------------------
// TriggerCoordinator
// ---------------------------------------------------------------------------

/// Owns the dictation cycle. One instance per process, shared by every
/// entry point.
pub struct TriggerCoordinator {
    state: SharedState,
    registry: SharedRegistry,
    history: Arc<Mutex<HistoryStore>>,
    providers: Arc<dyn ProviderFactory>,
    capture: Arc<dyn CaptureBackend>,
    cooldown: Duration,
    min_samples: usize,
}

impl TriggerCoordinator {
    pub fn new(
        state: SharedState,
        registry: SharedRegistry,
        history: Arc<Mutex<HistoryStore>>,
        providers: Arc<dyn ProviderFactory>,
        capture: Arc<dyn CaptureBackend>,
        config: &TriggerConfig,
    ) -> Self {
        Self {
            state,
            registry,
            history,
            providers,
            capture,
            cooldown: Duration::from_millis(config.start_cooldown_ms),
            min_samples: (config.min_recording_secs * TARGET_SAMPLE_RATE as f32) as usize,
        }
    }

    /// Shared state handle, for callers that render the buffer.
    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// The single entry point both the hotkey loop and UI call sites use.
    ///
    /// Signals inside the cooldown window of the last accepted start are
    /// discarded *before* phase dispatch: a hardware key-repeat 50 ms after
    /// the starting press must neither restart nor stop the recording.
    pub async fn toggle(&self) -> ToggleOutcome {
        let phase = {
            let st = self.state.lock().unwrap();
            if let Some(last) = st.last_start {
                if last.elapsed() < self.cooldown {
                    log::debug!("coordinator: signal inside cooldown window, discarded");
                    return ToggleOutcome::Ignored;
                }
            }
            st.dictation
        };
        match phase {
            DictationState::Idle => self.start().await,
            DictationState::Recording => self.stop().await,
            DictationState::Transcribing => {
                log::debug!("coordinator: start signal ignored while transcribing");
                ToggleOutcome::Ignored
            }
        }
    }

    /// Begin a recording. No-op outside `Idle`; discards signals inside the
    /// cooldown window; refuses to open the microphone without a key.
    pub async fn start(&self) -> ToggleOutcome {
        {
            let mut st = self.state.lock().unwrap();
            if st.dictation != DictationState::Idle {
                return ToggleOutcome::Ignored;
            }
            // Cooldown gate first: key-repeat duplicates die here before
            // they can touch anything else.
            if let Some(last) = st.last_start {
                if last.elapsed() < self.cooldown {
                    log::debug!("coordinator: start signal inside cooldown window, discarded");
                    return ToggleOutcome::Ignored;
                }
            }
            st.last_start = Some(Instant::now());
        }

        // Live registry read: whatever key is stored *now*.
        let has_key = {
            let mut registry = self.registry.lock().unwrap();
            let active = registry.active();
            registry
                .ensure_config(active, self.providers.as_ref())
                .has_key()
        };
        if !has_key {
            log::info!("coordinator: start refused, no API key configured");
            self.apply_notice(NoticeKind::NoCredential);
            return ToggleOutcome::Rejected(NoticeKind::NoCredential);
        }

        // Device setup blocks (permission prompt, driver init); keep it off
        // the async threads.
        let capture = Arc::clone(&self.capture);
        let session = tokio::task::spawn_blocking(move || capture.begin()).await;

        match session {
            Ok(Ok(session)) => {
                let mut st = self.state.lock().unwrap();
                // A placeholder message from a previous failure makes way
                // for the new dictation. Real user text is never cleared;
                // the check is against the structured notice, not the text.
                if let Some(kind) = st.notice.take() {
                    if st.buffer.text == kind.message() {
                        st.buffer.replace("");
                    }
                }
                st.anchor = Some(st.buffer.cursor);
                st.session = Some(session);
                st.dictation = DictationState::Recording;
                log::info!("coordinator: recording started");
                ToggleOutcome::Started
            }
            Ok(Err(e)) => {
                log::warn!("coordinator: microphone unavailable: {e}");
                self.apply_notice(NoticeKind::DeviceError);
                ToggleOutcome::Rejected(NoticeKind::DeviceError)
            }
            Err(e) => {
                log::error!("coordinator: capture task panicked: {e}");
                self.apply_notice(NoticeKind::DeviceError);
                ToggleOutcome::Rejected(NoticeKind::DeviceError)
            }
        }
    }

    /// Finish the recording and run transcription. No-op outside
    /// `Recording`. Always exits to `Idle`.
    pub async fn stop(&self) -> ToggleOutcome {
        let session = {
            let mut st = self.state.lock().unwrap();
            if st.dictation != DictationState::Recording {
                return ToggleOutcome::Ignored;
            }
            st.dictation = DictationState::Transcribing;
            st.session.take()
        };

        let status = match session {
            Some(session) => self.run_transcription(session).await,
            None => {
                // Recording without a session is a coordinator bug; degrade
                // to a visible failure instead of wedging the machine.
                log::error!("coordinator: recording phase had no capture session");
                self.apply_notice(NoticeKind::DeviceError);
                TranscriptStatus::Failed(NoticeKind::DeviceError)
            }
        };

        // The one exit from Transcribing, reached on every path above.
        self.state.lock().unwrap().dictation = DictationState::Idle;
        log::info!("coordinator: cycle finished: {status:?}");
        ToggleOutcome::Finished(status)
    }

    // -----------------------------------------------------------------------
    // Transcription cycle
    // -----------------------------------------------------------------------

    async fn run_transcription(
        &self,
        session: Box<dyn crate::audio::ActiveCapture>,
    ) -> TranscriptStatus {
        // Finalize audio first: this joins the capture thread and releases
        // the microphone before any network latency is spent.
        let samples = match tokio::task::spawn_blocking(move || session.finish()).await {
            Ok(Ok(samples)) => samples,
            Ok(Err(e)) => {
                log::warn!("coordinator: failed to finalize recording: {e}");
                self.apply_notice(NoticeKind::DeviceError);
                return TranscriptStatus::Failed(NoticeKind::DeviceError);
            }
            Err(e) => {
                log::error!("coordinator: finalize task panicked: {e}");
                self.apply_notice(NoticeKind::DeviceError);
                return TranscriptStatus::Failed(NoticeKind::DeviceError);
            }
        };

        if samples.len() < self.min_samples {
            log::info!(
                "coordinator: recording too short ({} samples < {})",
                samples.len(),
                self.min_samples
            );
            self.apply_notice(NoticeKind::RecordingTooShort);
            return TranscriptStatus::Failed(NoticeKind::RecordingTooShort);
        }

        let artifact = match AudioArtifact::wav(&samples) {
            Ok(artifact) => artifact,
            Err(e) => {
                log::error!("coordinator: artifact encoding failed: {e}");
                self.apply_notice(NoticeKind::TranscribeFailed);
                return TranscriptStatus::Failed(NoticeKind::TranscribeFailed);
            }
        };

        // Snapshot provider id, key, and model now, not at start() and
        // not at hotkey registration. Edits made while recording count.
        let (provider_id, key, model) = {
            let registry = self.registry.lock().unwrap();
            let id = registry.active();
            match registry.active_credentials() {
                Some((key, model)) => (id, key, model),
                None => {
                    // Key was cleared mid-recording.
                    self.apply_notice(NoticeKind::NoCredential);
                    return TranscriptStatus::Failed(NoticeKind::NoCredential);
                }
            }
        };

        log::info!(
            "coordinator: transcribing {:.1}s of audio via {}",
            samples.len() as f32 / TARGET_SAMPLE_RATE as f32,
            provider_id.display_name()
        );

        let provider = self.providers.create(provider_id);
        match provider.transcribe(&artifact, &model, &key).await {
            Ok(TranscriptionOutcome::Text(text)) => {
                {
                    let mut st = self.state.lock().unwrap();
                    let anchor = st.anchor.take().unwrap_or(st.buffer.cursor);
                    st.buffer.insert_at(anchor, &text);
                    st.notice = None;
                }
                self.history.lock().unwrap().record(&text);
                TranscriptStatus::Merged(text)
            }
            Ok(TranscriptionOutcome::NoSpeech) => {
                let mut st = self.state.lock().unwrap();
                // The fixed message, never the provider's sentinel text;
                // and only into an empty buffer. Real content stays.
                if st.buffer.text.is_empty() {
                    st.buffer.replace(NoticeKind::NoSpeech.message());
                }
                st.notice = Some(NoticeKind::NoSpeech);
                st.anchor = None;
                TranscriptStatus::NoSpeech
            }
            Err(ProviderError::AuthInvalid) => {
                log::warn!("coordinator: {provider_id} rejected the API key");
                self.registry
                    .lock()
                    .unwrap()
                    .apply_validation(provider_id, false);
                self.apply_notice(NoticeKind::AuthInvalid);
                TranscriptStatus::Failed(NoticeKind::AuthInvalid)
            }
            Err(e) => {
                log::warn!("coordinator: transcription failed: {e}");
                self.apply_notice(NoticeKind::TranscribeFailed);
                TranscriptStatus::Failed(NoticeKind::TranscribeFailed)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Surface a notice: structured kind for callers, fixed message in the
    /// buffer for the user.
    fn apply_notice(&self, kind: NoticeKind) {
        let mut st = self.state.lock().unwrap();
        st.notice = Some(kind);
        st.buffer.replace(kind.message());
        st.anchor = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
