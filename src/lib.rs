//! dictapad — hotkey-driven dictation into an editable text buffer.
//!
//! # Architecture
//!
//! ```text
//! hotkey / UI call site
//!        │ toggle()
//!        ▼
//! TriggerCoordinator (pipeline)  ── Idle ⇄ Recording ⇄ Transcribing
//!        │
//!        ├─ CaptureSession (audio)     microphone → 16 kHz WAV artifact
//!        ├─ TranscriptionProvider      OpenAI / Groq / Gemini adapters
//!        ├─ ProviderRegistry           keys, validation status, models
//!        ├─ merge::insert              cursor-aware transcript merge
//!        └─ HistoryStore               bounded newest-first log
//!
//! SharedState (Arc<Mutex<AppState>>) ←── read live by the hotkey path
//! ```
//!
//! The coordinator is the single source of truth for "is a recording or
//! transcription in flight". Both entry points (a UI call site and the
//! process-lifetime hotkey callback) go through the same [`SharedState`],
//! so neither can act on a stale snapshot.
//!
//! [`SharedState`]: pipeline::SharedState

pub mod audio;
pub mod clipboard;
pub mod config;
pub mod history;
pub mod hotkey;
pub mod merge;
pub mod pipeline;
pub mod provider;
pub mod registry;
pub mod store;
