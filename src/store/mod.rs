//! String-keyed JSON persistence — the local key-value store collaborator.
//!
//! The registry and the history store persist their state as JSON values
//! under fixed keys (see the `keys` module). [`JsonFileStore`] is the
//! production implementation backed by a single `store.json` file;
//! [`MemoryStore`] backs tests.
//!
//! The store itself is deliberately untyped (string key → JSON value);
//! typing and validation happen at the load boundary of whichever subsystem
//! owns a key.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Fixed keys
// ---------------------------------------------------------------------------

/// The fixed keys under which subsystems persist their state.
pub mod keys {
    /// Per-provider configuration map (`{ "<provider>": { … } }`).
    pub const PROVIDERS: &str = "providers";
    /// Currently selected provider id.
    pub const ACTIVE_PROVIDER: &str = "active_provider";
    /// Ordered array of history items, newest first.
    pub const HISTORY: &str = "history";
    /// Whether transcript history is recorded at all.
    pub const HISTORY_ENABLED: &str = "history_enabled";
    /// Maximum number of history items kept (0 = unbounded).
    pub const HISTORY_LIMIT: &str = "history_limit";
}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors arising from store I/O.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed reading store file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed writing store file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("store file is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// KvStore trait
// ---------------------------------------------------------------------------

/// String-keyed get/set over JSON values.
///
/// `set` persists immediately; there is no separate flush step. A failed
/// persist is reported to the caller, who decides whether it is fatal (for
/// this application it never is — see the error-handling notes in the
/// pipeline module).
pub trait KvStore: Send {
    /// Fetch the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key` and persist.
    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Shared handle to a store, usable from the coordinator and the registry
/// at the same time.
pub type SharedStore = Arc<Mutex<Box<dyn KvStore>>>;

/// Wrap a store implementation into a [`SharedStore`].
pub fn shared(store: impl KvStore + 'static) -> SharedStore {
    let boxed: Box<dyn KvStore> = Box::new(store);
    Arc::new(Mutex::new(boxed))
}

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// Production store: one pretty-printed JSON object in `store.json`.
///
/// The whole file is read once at construction and rewritten on every `set`.
pub struct JsonFileStore {
    path: PathBuf,
    map: BTreeMap<String, Value>,
}

impl JsonFileStore {
    /// Open the store at `path`, creating an empty one if the file does not
    /// exist yet.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let map = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|source| StoreError::Read {
                path: path.display().to_string(),
                source,
            })?;
            serde_json::from_str(&raw)?
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, map })
    }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: self.path.display().to_string(),
                source,
            })?;
        }
        let content = serde_json::to_string_pretty(&self.map)?;
        std::fs::write(&self.path, content).map_err(|source| StoreError::Write {
            path: self.path.display().to_string(),
            source,
        })
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.map.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.map.insert(key.to_string(), value);
        self.persist()
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store for tests. Never touches the filesystem.
#[derive(Default)]
pub struct MemoryStore {
    map: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.map.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.map.insert(key.to_string(), value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
