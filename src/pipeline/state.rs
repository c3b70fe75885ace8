//! Dictation state machine and shared application state.
//!
//! [`DictationState`] is the trigger coordinator's phase. [`AppState`] holds
//! everything the two entry points (UI call site, hotkey callback) must
//! observe consistently: the phase, the text buffer, the merge anchor, the
//! live capture session, and the start-signal cooldown clock.
//!
//! [`SharedState`] (`Arc<Mutex<AppState>>`) is the live-reference mechanism
//! the hotkey path requires: the callback is registered once for the
//! process lifetime, so it must read state at call time rather than values
//! closed over at registration time.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::audio::ActiveCapture;
use crate::merge::TextBuffer;

// ---------------------------------------------------------------------------
// DictationState
// ---------------------------------------------------------------------------

/// Phases of the dictation cycle.
///
/// ```text
/// Idle ──start──▶ Recording ──stop──▶ Transcribing ──▶ Idle
///                                      (success and failure both end here)
/// ```
///
/// Terminal transitions only pass through `Idle`; a start signal in any
/// non-idle phase is an idempotent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictationState {
    /// Waiting for a start signal.
    Idle,
    /// Microphone is open; audio is accumulating.
    Recording,
    /// Audio is finalized and a provider request is in flight.
    Transcribing,
}

impl DictationState {
    /// `true` while a recording or transcription is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, DictationState::Recording | DictationState::Transcribing)
    }

    /// Short label for logs and status display.
    pub fn label(&self) -> &'static str {
        match self {
            DictationState::Idle => "Idle",
            DictationState::Recording => "Recording",
            DictationState::Transcribing => "Transcribing",
        }
    }
}

impl Default for DictationState {
    fn default() -> Self {
        DictationState::Idle
    }
}

// ---------------------------------------------------------------------------
// NoticeKind
// ---------------------------------------------------------------------------

/// Structured classification of every user-visible condition the
/// coordinator can produce.
///
/// This type travels end-to-end: callers branch on the kind, never on the
/// display text. The fixed messages exist only for the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// No API key configured for the active provider.
    NoCredential,
    /// Microphone could not be opened (missing device, permission denied).
    DeviceError,
    /// The recording was shorter than the minimum transcribable length.
    RecordingTooShort,
    /// The provider rejected the API key (401/403).
    AuthInvalid,
    /// The provider heard no speech.
    NoSpeech,
    /// Any other transcription failure (transport, envelope, rejection).
    TranscribeFailed,
}

impl NoticeKind {
    /// Every notice, for exhaustive checks (history placeholder guard).
    pub const ALL: [NoticeKind; 6] = [
        NoticeKind::NoCredential,
        NoticeKind::DeviceError,
        NoticeKind::RecordingTooShort,
        NoticeKind::AuthInvalid,
        NoticeKind::NoSpeech,
        NoticeKind::TranscribeFailed,
    ];

    /// The fixed user-visible message for this notice.
    pub fn message(&self) -> &'static str {
        match self {
            NoticeKind::NoCredential => {
                "No API key configured for the selected provider. Add one in settings."
            }
            NoticeKind::DeviceError => {
                "Microphone unavailable. Check your input device and permissions."
            }
            NoticeKind::RecordingTooShort => "Recording was too short to transcribe.",
            NoticeKind::AuthInvalid => "API key was rejected by the provider. Check it in settings.",
            NoticeKind::NoSpeech => "No speech detected.",
            NoticeKind::TranscribeFailed => "Transcription failed. Please try again.",
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Everything both entry points read and write.
///
/// Held behind [`SharedState`]. Lock for short critical sections only; the
/// coordinator never holds the lock across an `.await`.
pub struct AppState {
    /// Current phase of the dictation cycle.
    pub dictation: DictationState,

    /// The editable text buffer transcripts merge into.
    pub buffer: TextBuffer,

    /// Cursor offset captured at recording start. The user may edit the
    /// buffer while transcription is in flight, so the merge uses this, not
    /// the cursor at completion time.
    pub anchor: Option<usize>,

    /// The one live capture session, present only while `Recording`.
    pub session: Option<Box<dyn ActiveCapture>>,

    /// Last produced notice, cleared by the next successful merge.
    pub notice: Option<NoticeKind>,

    /// Instant of the last accepted start signal, for the cooldown window.
    pub last_start: Option<Instant>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            dictation: DictationState::Idle,
            buffer: TextBuffer::default(),
            anchor: None,
            session: None,
            notice: None,
            last_start: None,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("dictation", &self.dictation)
            .field("buffer", &self.buffer)
            .field("anchor", &self.anchor)
            .field("session", &self.session.is_some())
            .field("notice", &self.notice)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`]: cheap to clone, read at call time.
pub type SharedState = Arc<Mutex<AppState>>;

/// Construct a new [`SharedState`] wrapping a default [`AppState`].
pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(AppState::new()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_is_not_busy() {
        assert!(!DictationState::Idle.is_busy());
    }

    #[test]
    fn recording_and_transcribing_are_busy() {
        assert!(DictationState::Recording.is_busy());
        assert!(DictationState::Transcribing.is_busy());
    }

    #[test]
    fn default_state_is_idle() {
        assert_eq!(DictationState::default(), DictationState::Idle);
        let state = AppState::default();
        assert_eq!(state.dictation, DictationState::Idle);
        assert!(state.session.is_none());
        assert!(state.anchor.is_none());
    }

    #[test]
    fn labels_are_distinct() {
        let labels = [
            DictationState::Idle.label(),
            DictationState::Recording.label(),
            DictationState::Transcribing.label(),
        ];
        assert_eq!(
            labels.len(),
            labels.iter().collect::<std::collections::HashSet<_>>().len()
        );
    }

    #[test]
    fn notice_messages_are_distinct_and_non_empty() {
        let messages: Vec<_> = NoticeKind::ALL.iter().map(|k| k.message()).collect();
        assert!(messages.iter().all(|m| !m.is_empty()));
        assert_eq!(
            messages.len(),
            messages.iter().collect::<std::collections::HashSet<_>>().len()
        );
    }

    #[test]
    fn shared_state_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<SharedState>();
    }

    #[test]
    fn shared_state_clones_observe_the_same_mutation() {
        let state = new_shared_state();
        let state2 = Arc::clone(&state);

        state.lock().unwrap().dictation = DictationState::Recording;
        assert_eq!(
            state2.lock().unwrap().dictation,
            DictationState::Recording
        );
    }
}
