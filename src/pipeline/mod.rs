//! Trigger coordination — the state machine unifying every dictation entry
//! point.
//!
//! # Architecture
//!
//! ```text
//! HotkeyEvent (mpsc)            UI call site
//!        │                           │
//!        └──────────┬────────────────┘
//!                   ▼
//!        TriggerCoordinator::toggle()
//!                   │
//!        Idle ──▶ start(): cooldown → key check → CaptureSession
//!        Recording ─▶ stop(): finish audio → provider → merge → history
//!        Transcribing ─▶ ignored
//!
//! SharedState (Arc<Mutex<AppState>>) ←── live reads from both entry points
//! ```
//!
//! The coordinator holds its collaborators as injected trait objects
//! ([`crate::audio::CaptureBackend`], [`crate::provider::ProviderFactory`])
//! and reads credentials through the shared registry at trigger time, so
//! the process-lifetime hotkey callback never acts on stale state.

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{ToggleOutcome, TranscriptStatus, TriggerCoordinator};
pub use state::{new_shared_state, AppState, DictationState, NoticeKind, SharedState};
