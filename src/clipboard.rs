//! Clipboard write collaborator backed by the `arboard` crate.
//!
//! A short-lived [`arboard::Clipboard`] handle is created per call rather
//! than shared, because the handle is not `Send` on all platforms and is
//! cheap to create.

use arboard::Clipboard;
use thiserror::Error;

/// Errors from the system clipboard.
#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("failed to open the system clipboard: {0}")]
    Access(String),

    #[error("failed to write to the clipboard: {0}")]
    Write(String),
}

/// Write `text` into the system clipboard, replacing whatever was there.
pub fn write_text(text: &str) -> Result<(), ClipboardError> {
    let mut clipboard = Clipboard::new().map_err(|e| ClipboardError::Access(e.to_string()))?;
    clipboard
        .set_text(text)
        .map_err(|e| ClipboardError::Write(e.to_string()))
}
