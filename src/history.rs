//! Bounded, newest-first log of accepted transcripts.
//!
//! Fed by the trigger coordinator after a successful merge; independent of
//! everything else. Items persist under the store's `history` key, the
//! enabled flag and limit under their own scalar keys.
//!
//! `record` only ever sees transcripts the coordinator accepted; failures
//! carry structured notices and never reach this module. It still refuses
//! the placeholder messages themselves (guarded against the notice catalog,
//! not ad-hoc prefixes) so a restored buffer can never launder one into
//! history.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::pipeline::state::NoticeKind;
use crate::store::{keys, SharedStore};

/// Transcripts shorter than this are noise (a stray "ok", a breath).
const MIN_RECORD_CHARS: usize = 3;

/// Default cap on stored items. 0 = unbounded.
const DEFAULT_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// HistoryItem
// ---------------------------------------------------------------------------

/// One accepted transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    /// Unique within the store, monotonically increasing.
    pub id: u64,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// HistoryStore
// ---------------------------------------------------------------------------

/// Newest-first transcript history with a configurable cap.
pub struct HistoryStore {
    items: Vec<HistoryItem>,
    enabled: bool,
    limit: usize,
    store: SharedStore,
}

impl HistoryStore {
    /// Load history and its settings from the store, tolerating missing or
    /// malformed values (first run, hand-edited file).
    pub fn load(store: SharedStore) -> Self {
        let (raw_items, raw_enabled, raw_limit) = {
            let guard = store.lock().unwrap();
            (
                guard.get(keys::HISTORY),
                guard.get(keys::HISTORY_ENABLED),
                guard.get(keys::HISTORY_LIMIT),
            )
        };

        let items = raw_items
            .and_then(|v| match serde_json::from_value::<Vec<HistoryItem>>(v) {
                Ok(items) => Some(items),
                Err(e) => {
                    log::warn!("history: stored list is malformed, starting empty: {e}");
                    None
                }
            })
            .unwrap_or_default();

        let enabled = raw_enabled.and_then(|v| v.as_bool()).unwrap_or(true);
        let limit = raw_limit
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_LIMIT);

        Self {
            items,
            enabled,
            limit,
            store,
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Record a transcript. Returns `false` (and stores nothing) when
    /// history is disabled, the text is too short, the text is one of the
    /// coordinator's placeholder messages, or it equals the most recent
    /// entry.
    pub fn record(&mut self, text: &str) -> bool {
        let text = text.trim();

        if !self.enabled
            || text.chars().count() < MIN_RECORD_CHARS
            || Self::is_placeholder(text)
            || self.items.first().is_some_and(|item| item.text == text)
        {
            return false;
        }

        let id = self.items.iter().map(|i| i.id).max().unwrap_or(0) + 1;
        self.items.insert(
            0,
            HistoryItem {
                id,
                text: text.to_string(),
                timestamp_ms: now_ms(),
            },
        );
        self.truncate();
        self.persist();
        true
    }

    /// Remove one item by id. Unknown ids are a no-op.
    pub fn delete(&mut self, id: u64) {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        if self.items.len() != before {
            self.persist();
        }
    }

    /// Drop all items.
    pub fn clear(&mut self) {
        self.items.clear();
        self.persist();
    }

    /// Change the cap. `n > 0` re-truncates existing items immediately;
    /// `0` means unbounded and never truncates.
    pub fn set_limit(&mut self, n: usize) {
        self.limit = n;
        self.truncate();
        self.persist();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.persist();
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn is_placeholder(text: &str) -> bool {
        NoticeKind::ALL.iter().any(|kind| kind.message() == text)
    }

    fn truncate(&mut self) {
        if self.limit > 0 && self.items.len() > self.limit {
            self.items.truncate(self.limit);
        }
    }

    fn persist(&self) {
        let mut guard = self.store.lock().unwrap();
        if let Err(e) = guard.set(keys::HISTORY, serde_json::json!(self.items)) {
            log::warn!("history: failed to persist items: {e}");
        }
        if let Err(e) = guard.set(keys::HISTORY_ENABLED, serde_json::json!(self.enabled)) {
            log::warn!("history: failed to persist enabled flag: {e}");
        }
        if let Err(e) = guard.set(keys::HISTORY_LIMIT, serde_json::json!(self.limit)) {
            log::warn!("history: failed to persist limit: {e}");
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{shared, MemoryStore};
    use std::sync::Arc;

    fn fresh() -> HistoryStore {
        HistoryStore::load(shared(MemoryStore::new()))
    }

    #[test]
    fn records_newest_first() {
        let mut history = fresh();
        assert!(history.record("first transcript"));
        assert!(history.record("second transcript"));

        assert_eq!(history.items()[0].text, "second transcript");
        assert_eq!(history.items()[1].text, "first transcript");
        assert!(history.items()[0].id > history.items()[1].id);
    }

    #[test]
    fn immediate_duplicate_is_recorded_once() {
        let mut history = fresh();
        assert!(history.record("hello"));
        assert!(!history.record("hello"));
        assert_eq!(history.items().len(), 1);
    }

    #[test]
    fn non_adjacent_duplicate_is_allowed() {
        let mut history = fresh();
        history.record("alpha");
        history.record("beta");
        assert!(history.record("alpha"));
        assert_eq!(history.items().len(), 3);
    }

    #[test]
    fn short_text_is_rejected() {
        let mut history = fresh();
        assert!(!history.record("ok"));
        assert!(!history.record("  a  "));
        assert!(history.items().is_empty());
    }

    #[test]
    fn disabled_history_records_nothing() {
        let mut history = fresh();
        history.set_enabled(false);
        assert!(!history.record("a perfectly fine transcript"));
        assert!(history.items().is_empty());
    }

    #[test]
    fn placeholder_messages_are_rejected() {
        let mut history = fresh();
        for kind in NoticeKind::ALL {
            assert!(!history.record(kind.message()), "recorded {kind:?}");
        }
        assert!(history.items().is_empty());
    }

    #[test]
    fn limit_truncates_oldest() {
        let mut history = fresh();
        history.set_limit(2);
        history.record("one one");
        history.record("two two");
        history.record("three three");

        assert_eq!(history.items().len(), 2);
        assert_eq!(history.items()[0].text, "three three");
        assert_eq!(history.items()[1].text, "two two");
    }

    #[test]
    fn set_limit_retruncates_existing_items() {
        let mut history = fresh();
        history.record("one one");
        history.record("two two");
        history.record("three three");

        history.set_limit(1);
        assert_eq!(history.items().len(), 1);
        assert_eq!(history.items()[0].text, "three three");
    }

    #[test]
    fn zero_limit_never_truncates() {
        let mut history = fresh();
        history.set_limit(0);
        for i in 0..100 {
            history.record(&format!("transcript number {i}"));
        }
        assert_eq!(history.items().len(), 100);
    }

    #[test]
    fn delete_removes_only_the_given_id() {
        let mut history = fresh();
        history.record("keep me around");
        history.record("delete me please");
        let doomed = history.items()[0].id;

        history.delete(doomed);
        assert_eq!(history.items().len(), 1);
        assert_eq!(history.items()[0].text, "keep me around");

        // Unknown id is a no-op.
        history.delete(9999);
        assert_eq!(history.items().len(), 1);
    }

    #[test]
    fn clear_empties_the_list() {
        let mut history = fresh();
        history.record("something something");
        history.clear();
        assert!(history.items().is_empty());
    }

    #[test]
    fn history_round_trips_through_store() {
        let store = shared(MemoryStore::new());

        {
            let mut history = HistoryStore::load(Arc::clone(&store));
            history.set_limit(7);
            history.record("persisted transcript");
        }

        let reloaded = HistoryStore::load(store);
        assert_eq!(reloaded.limit(), 7);
        assert_eq!(reloaded.items().len(), 1);
        assert_eq!(reloaded.items()[0].text, "persisted transcript");
    }
}
