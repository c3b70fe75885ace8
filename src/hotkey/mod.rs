//! Global hotkey listener for the dictation toggle, backed by `rdev`.
//!
//! # Design
//!
//! `rdev::listen()` is a blocking OS-level call that never returns while
//! the process is alive, so it runs on a dedicated OS thread (see
//! [`listener`]). The callback it registers lives for the process lifetime;
//! it forwards bare [`HotkeyEvent::Toggle`] signals over a channel and
//! holds no application state at all — phase, credentials and buffer are
//! read by the coordinator when the event is handled. Debouncing of
//! key-repeat duplicates also happens there, not here.

pub mod listener;

pub use listener::HotkeyListener;

// ---------------------------------------------------------------------------
// HotkeyEvent
// ---------------------------------------------------------------------------

/// Events emitted by the hotkey listener thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// The toggle key was pressed.
    Toggle,
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Parse a hotkey name from a config string into an [`rdev::Key`].
///
/// Supports F1-F12, common named keys, and single ASCII letters. Returns
/// `None` for unrecognised names so callers can fall back to a default.
///
/// # Examples
///
/// ```
/// use dictapad::hotkey::parse_key;
///
/// assert_eq!(parse_key("F9"),     Some(rdev::Key::F9));
/// assert_eq!(parse_key("Escape"), Some(rdev::Key::Escape));
/// assert_eq!(parse_key("d"),      Some(rdev::Key::KeyD));
/// assert_eq!(parse_key("Ctrl+D"), None);
/// ```
pub fn parse_key(key_str: &str) -> Option<rdev::Key> {
    match key_str {
        // Function keys
        "F1" => Some(rdev::Key::F1),
        "F2" => Some(rdev::Key::F2),
        "F3" => Some(rdev::Key::F3),
        "F4" => Some(rdev::Key::F4),
        "F5" => Some(rdev::Key::F5),
        "F6" => Some(rdev::Key::F6),
        "F7" => Some(rdev::Key::F7),
        "F8" => Some(rdev::Key::F8),
        "F9" => Some(rdev::Key::F9),
        "F10" => Some(rdev::Key::F10),
        "F11" => Some(rdev::Key::F11),
        "F12" => Some(rdev::Key::F12),

        // Navigation / control
        "Escape" | "Esc" => Some(rdev::Key::Escape),
        "Space" => Some(rdev::Key::Space),
        "Return" | "Enter" => Some(rdev::Key::Return),
        "Tab" => Some(rdev::Key::Tab),
        "Home" => Some(rdev::Key::Home),
        "End" => Some(rdev::Key::End),
        "Pause" => Some(rdev::Key::Pause),
        "ScrollLock" => Some(rdev::Key::ScrollLock),
        "PrintScreen" => Some(rdev::Key::PrintScreen),

        // Letter keys (case-insensitive)
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => letter_key(c),
                _ => None,
            }
        }
    }
}

fn letter_key(c: char) -> Option<rdev::Key> {
    match c.to_ascii_lowercase() {
        'a' => Some(rdev::Key::KeyA),
        'b' => Some(rdev::Key::KeyB),
        'c' => Some(rdev::Key::KeyC),
        'd' => Some(rdev::Key::KeyD),
        'e' => Some(rdev::Key::KeyE),
        'f' => Some(rdev::Key::KeyF),
        'g' => Some(rdev::Key::KeyG),
        'h' => Some(rdev::Key::KeyH),
        'i' => Some(rdev::Key::KeyI),
        'j' => Some(rdev::Key::KeyJ),
        'k' => Some(rdev::Key::KeyK),
        'l' => Some(rdev::Key::KeyL),
        'm' => Some(rdev::Key::KeyM),
        'n' => Some(rdev::Key::KeyN),
        'o' => Some(rdev::Key::KeyO),
        'p' => Some(rdev::Key::KeyP),
        'q' => Some(rdev::Key::KeyQ),
        'r' => Some(rdev::Key::KeyR),
        's' => Some(rdev::Key::KeyS),
        't' => Some(rdev::Key::KeyT),
        'u' => Some(rdev::Key::KeyU),
        'v' => Some(rdev::Key::KeyV),
        'w' => Some(rdev::Key::KeyW),
        'x' => Some(rdev::Key::KeyX),
        'y' => Some(rdev::Key::KeyY),
        'z' => Some(rdev::Key::KeyZ),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
