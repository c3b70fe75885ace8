//! Cursor-aware text merge — inserts a finished transcript into the buffer.
//!
//! [`insert`] is a pure function: the same `(text, cursor, new_text)` triple
//! always produces the same result, with no hidden state. Both the UI call
//! site and the hotkey path use it identically; the coordinator captures the
//! cursor at recording start and clamps it at merge time.
//!
//! Cursor offsets count **characters**, not bytes, so an insertion can never
//! split a UTF-8 sequence.

// ---------------------------------------------------------------------------
// TextBuffer
// ---------------------------------------------------------------------------

/// The editable text buffer plus its cursor position.
///
/// `cursor` is a character offset with `0 <= cursor <= text.chars().count()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    pub text: String,
    pub cursor: usize,
}

impl TextBuffer {
    /// Character length of the buffer.
    pub fn len_chars(&self) -> usize {
        self.text.chars().count()
    }

    /// Replace the whole buffer with `text`, cursor at the end.
    pub fn replace(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.len_chars();
    }

    /// Insert `new_text` at `anchor` (clamped to the current length) using
    /// the separator rule of [`insert`], updating text and cursor in place.
    pub fn insert_at(&mut self, anchor: usize, new_text: &str) {
        let anchor = anchor.min(self.len_chars());
        let (text, cursor) = insert(&self.text, anchor, new_text);
        self.text = text;
        self.cursor = cursor;
    }
}

// ---------------------------------------------------------------------------
// insert
// ---------------------------------------------------------------------------

/// Insert `new_text` into `text` at character offset `cursor`.
///
/// If the character immediately before `cursor` exists and is not
/// whitespace, a single space is inserted first so two words never run
/// together. At buffer start, or after whitespace (including newlines), no
/// separator is added. The returned cursor sits at the end of the inserted
/// span.
///
/// Repeated calls append by design; this function makes no idempotence
/// claim.
///
/// # Panics
///
/// Panics if `cursor > text.chars().count()`; callers clamp first (see
/// [`TextBuffer::insert_at`]).
///
/// # Examples
///
/// ```
/// use dictapad::merge::insert;
///
/// assert_eq!(insert("Hello", 5, "world"), ("Hello world".into(), 11));
/// assert_eq!(insert("", 0, "Test"), ("Test".into(), 4));
/// assert_eq!(insert("a ", 2, "b"), ("a b".into(), 3));
/// ```
pub fn insert(text: &str, cursor: usize, new_text: &str) -> (String, usize) {
    let total = text.chars().count();
    assert!(
        cursor <= total,
        "cursor {cursor} out of bounds for buffer of {total} chars"
    );

    if new_text.is_empty() {
        return (text.to_string(), cursor);
    }

    let byte_pos = char_to_byte(text, cursor);
    let prefix = &text[..byte_pos];
    let suffix = &text[byte_pos..];

    let needs_separator = match prefix.chars().next_back() {
        None => false,
        Some(c) => !c.is_whitespace(),
    };

    let mut out = String::with_capacity(text.len() + new_text.len() + 1);
    out.push_str(prefix);
    if needs_separator {
        out.push(' ');
    }
    out.push_str(new_text);
    out.push_str(suffix);

    let inserted = new_text.chars().count() + usize::from(needs_separator);
    (out, cursor + inserted)
}

/// Translate a character offset into a byte offset within `text`.
fn char_to_byte(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_at_end_after_word_adds_one_space() {
        let (text, cursor) = insert("Hello", 5, "world");
        assert_eq!(text, "Hello world");
        assert_eq!(cursor, 11);
    }

    #[test]
    fn insert_into_empty_buffer() {
        let (text, cursor) = insert("", 0, "Test");
        assert_eq!(text, "Test");
        assert_eq!(cursor, 4);
    }

    #[test]
    fn insert_after_space_adds_no_separator() {
        let (text, cursor) = insert("Hello ", 6, "world");
        assert_eq!(text, "Hello world");
        assert_eq!(cursor, 11);
        assert!(!text.contains("  "));
    }

    #[test]
    fn insert_after_newline_adds_no_separator() {
        let (text, cursor) = insert("line one\n", 9, "two");
        assert_eq!(text, "line one\ntwo");
        assert_eq!(cursor, 12);
    }

    #[test]
    fn insert_in_the_middle_keeps_suffix() {
        // "ab|cd" with cursor after 'b'
        let (text, cursor) = insert("abcd", 2, "X");
        assert_eq!(text, "ab Xcd");
        assert_eq!(cursor, 4);
    }

    #[test]
    fn insert_at_start_adds_no_separator() {
        let (text, cursor) = insert("world", 0, "hello");
        assert_eq!(text, "helloworld");
        assert_eq!(cursor, 5);
    }

    #[test]
    fn empty_new_text_is_a_no_op() {
        let (text, cursor) = insert("abc", 1, "");
        assert_eq!(text, "abc");
        assert_eq!(cursor, 1);
    }

    #[test]
    fn multibyte_text_uses_char_offsets() {
        // "héllo" is 5 chars but 6 bytes; cursor 5 = end.
        let (text, cursor) = insert("héllo", 5, "wörld");
        assert_eq!(text, "héllo wörld");
        assert_eq!(cursor, 11);
    }

    #[test]
    fn new_cursor_always_within_bounds() {
        let cases = [
            ("", 0usize, "a"),
            ("x", 0, "y"),
            ("x", 1, "y"),
            ("hello world", 5, "mid"),
            ("tab\there", 4, "in"),
        ];
        for (buf, cur, add) in cases {
            let (out, new_cur) = insert(buf, cur, add);
            assert!(
                new_cur <= out.chars().count(),
                "cursor {new_cur} escaped buffer {out:?}"
            );
        }
    }

    #[test]
    fn buffer_never_shrinks() {
        let cases = [("abc", 3usize, "d"), ("a b", 1, "x"), ("", 0, "q")];
        for (buf, cur, add) in cases {
            let (out, _) = insert(buf, cur, add);
            assert!(out.chars().count() >= buf.chars().count());
        }
    }

    // ---- TextBuffer ---

    #[test]
    fn text_buffer_insert_clamps_anchor() {
        let mut buf = TextBuffer {
            text: "ab".into(),
            cursor: 2,
        };
        // Anchor beyond the end (buffer was edited shorter mid-flight).
        buf.insert_at(10, "c");
        assert_eq!(buf.text, "ab c");
        assert_eq!(buf.cursor, 4);
    }

    #[test]
    fn text_buffer_replace_moves_cursor_to_end() {
        let mut buf = TextBuffer::default();
        buf.replace("héllo");
        assert_eq!(buf.cursor, 5);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn insert_panics_on_out_of_range_cursor() {
        let _ = insert("ab", 3, "x");
    }
}
