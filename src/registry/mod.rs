//! Credential & model registry — per-provider API keys, validation status,
//! and model catalogs.
//!
//! [`ProviderRegistry`] is the typed view over the store's `providers` and
//! `active_provider` keys. Entries are created with defaults on first use
//! and never deleted, only overwritten. Validation and model-fetch
//! completions race with user edits by design; a later write always wins
//! (last-write-wins, keyed by provider), so no merge logic exists here.
//!
//! The registry lives behind `Arc<Mutex<…>>` ([`SharedRegistry`]) because
//! the hotkey path must read the *current* key and model at trigger time,
//! not values captured when the hotkey was registered.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::provider::{ModelEntry, ProviderFactory, ProviderId};
use crate::store::{keys, SharedStore};

// ---------------------------------------------------------------------------
// KeyStatus
// ---------------------------------------------------------------------------

/// Validation state of a stored API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    /// Key entered (or empty) but not yet probed.
    Unverified,
    /// A validation probe is in flight.
    Verifying,
    /// Last probe succeeded.
    Valid,
    /// Last probe failed, or a provider returned 401/403.
    Invalid,
}

impl Default for KeyStatus {
    fn default() -> Self {
        KeyStatus::Unverified
    }
}

// ---------------------------------------------------------------------------
// ProviderConfig
// ---------------------------------------------------------------------------

/// Stored per-provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Opaque secret. Empty = not configured.
    pub api_key: String,
    /// Validation state. Runtime-only: reset to `Unverified` on load.
    #[serde(default, skip_serializing)]
    pub key_status: KeyStatus,
    /// Must belong to `available_models` once models have been fetched;
    /// holds the provider default before that.
    pub selected_model: String,
    /// Last fetched (or default) catalog, provider order preserved.
    pub available_models: Vec<ModelEntry>,
    /// A catalog fetch is in flight. Runtime-only: reset on load.
    #[serde(default, skip_serializing)]
    pub models_loading: bool,
}

impl ProviderConfig {
    /// Fresh config for a provider seen for the first time: empty key,
    /// default catalog, first catalog entry selected.
    fn with_defaults(models: Vec<ModelEntry>) -> Self {
        let selected_model = models.first().map(|m| m.id.clone()).unwrap_or_default();
        Self {
            api_key: String::new(),
            key_status: KeyStatus::Unverified,
            selected_model,
            available_models: models,
            models_loading: false,
        }
    }

    /// A provider is usable when a non-empty key is configured.
    pub fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// ProviderRegistry
// ---------------------------------------------------------------------------

/// Thread-safe handle to the registry; the hotkey path reads through this
/// at call time.
pub type SharedRegistry = Arc<Mutex<ProviderRegistry>>;

/// The registry proper. Every mutation persists immediately; persistence
/// failures are logged, never propagated.
pub struct ProviderRegistry {
    configs: BTreeMap<ProviderId, ProviderConfig>,
    active: ProviderId,
    store: SharedStore,
}

impl ProviderRegistry {
    const DEFAULT_PROVIDER: ProviderId = ProviderId::OpenAi;

    /// Load the registry from the store, validating at the boundary.
    ///
    /// Unknown provider keys in the stored map are dropped with a warning
    /// (the defensive path for a selection outside the closed set); a
    /// malformed map falls back to empty. Runtime fields reset on load.
    pub fn load(store: SharedStore, factory: &dyn ProviderFactory) -> Self {
        let (raw_map, raw_active) = {
            let guard = store.lock().unwrap();
            (guard.get(keys::PROVIDERS), guard.get(keys::ACTIVE_PROVIDER))
        };

        let mut configs: BTreeMap<ProviderId, ProviderConfig> = BTreeMap::new();
        if let Some(value) = raw_map {
            match serde_json::from_value::<BTreeMap<String, ProviderConfig>>(value) {
                Ok(stored) => {
                    for (key, config) in stored {
                        match ProviderId::from_str(&key) {
                            Ok(id) => {
                                configs.insert(id, config);
                            }
                            Err(e) => log::warn!("registry: dropping stored entry: {e}"),
                        }
                    }
                }
                Err(e) => log::warn!("registry: stored provider map is malformed: {e}"),
            }
        }

        let active = raw_active
            .and_then(|v| v.as_str().map(str::to_string))
            .and_then(|s| match ProviderId::from_str(&s) {
                Ok(id) => Some(id),
                Err(e) => {
                    log::warn!("registry: {e}; falling back to {}", Self::DEFAULT_PROVIDER);
                    None
                }
            })
            .unwrap_or(Self::DEFAULT_PROVIDER);

        let mut registry = Self {
            configs,
            active,
            store,
        };

        // Make sure the active provider has an entry even on first run.
        registry.ensure_config(active, factory);
        registry
    }

    /// Build an empty registry over the given store (tests, first run).
    pub fn new(store: SharedStore) -> Self {
        Self {
            configs: BTreeMap::new(),
            active: Self::DEFAULT_PROVIDER,
            store,
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn active(&self) -> ProviderId {
        self.active
    }

    /// Current config for `id`, if it has ever been touched.
    pub fn config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.configs.get(&id)
    }

    /// Snapshot of `(key, selected_model)` for the active provider, read by
    /// the coordinator at transcription time.
    pub fn active_credentials(&self) -> Option<(String, String)> {
        self.configs
            .get(&self.active)
            .filter(|c| c.has_key())
            .map(|c| (c.api_key.clone(), c.selected_model.clone()))
    }

    // -----------------------------------------------------------------------
    // Mutations — all persist immediately, last write wins
    // -----------------------------------------------------------------------

    /// Get-or-create the config entry, seeding the default catalog from the
    /// provider adapter on first use.
    pub fn ensure_config(
        &mut self,
        id: ProviderId,
        factory: &dyn ProviderFactory,
    ) -> &ProviderConfig {
        if !self.configs.contains_key(&id) {
            let defaults = factory.create(id).default_models();
            self.configs
                .insert(id, ProviderConfig::with_defaults(defaults));
            self.persist();
        }
        &self.configs[&id]
    }

    pub fn set_active(&mut self, id: ProviderId, factory: &dyn ProviderFactory) {
        self.active = id;
        self.ensure_config(id, factory);
        self.persist();
    }

    /// Store a new API key. Status drops back to `Unverified` until the
    /// next probe completes.
    pub fn set_api_key(&mut self, id: ProviderId, key: &str, factory: &dyn ProviderFactory) {
        self.ensure_config(id, factory);
        if let Some(config) = self.configs.get_mut(&id) {
            config.api_key = key.to_string();
            config.key_status = KeyStatus::Unverified;
        }
        self.persist();
    }

    /// Mark a probe as started.
    pub fn begin_validation(&mut self, id: ProviderId) {
        if let Some(config) = self.configs.get_mut(&id) {
            config.key_status = KeyStatus::Verifying;
        }
    }

    /// Apply a probe result. Overwrites whatever status is present;
    /// completions are last-write-wins.
    pub fn apply_validation(&mut self, id: ProviderId, valid: bool) {
        if let Some(config) = self.configs.get_mut(&id) {
            config.key_status = if valid {
                KeyStatus::Valid
            } else {
                KeyStatus::Invalid
            };
            self.persist();
        }
    }

    pub fn begin_models_fetch(&mut self, id: ProviderId) {
        if let Some(config) = self.configs.get_mut(&id) {
            config.models_loading = true;
        }
    }

    /// Apply a fetched catalog. Enforces the selected-model invariant: a
    /// selection that is no longer in the catalog resets to the first
    /// entry. An empty catalog is ignored (adapters never produce one).
    pub fn apply_models(&mut self, id: ProviderId, models: Vec<ModelEntry>) {
        let Some(config) = self.configs.get_mut(&id) else {
            return;
        };
        config.models_loading = false;

        if models.is_empty() {
            log::warn!("registry: ignoring empty model catalog for {id}");
            return;
        }

        if !models.iter().any(|m| m.id == config.selected_model) {
            config.selected_model = models[0].id.clone();
        }
        config.available_models = models;
        self.persist();
    }

    /// Select a model. Rejects ids outside the current catalog.
    pub fn set_selected_model(&mut self, id: ProviderId, model_id: &str) {
        let Some(config) = self.configs.get_mut(&id) else {
            return;
        };
        if config.available_models.iter().any(|m| m.id == model_id) {
            config.selected_model = model_id.to_string();
            self.persist();
        } else {
            log::warn!("registry: {id} has no model {model_id}; selection unchanged");
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn persist(&self) {
        let map: BTreeMap<&str, &ProviderConfig> = self
            .configs
            .iter()
            .map(|(id, config)| (id.as_str(), config))
            .collect();

        let mut guard = self.store.lock().unwrap();
        if let Err(e) = guard.set(keys::PROVIDERS, serde_json::json!(map)) {
            log::warn!("registry: failed to persist provider map: {e}");
        }
        if let Err(e) = guard.set(
            keys::ACTIVE_PROVIDER,
            serde_json::json!(self.active.as_str()),
        ) {
            log::warn!("registry: failed to persist active provider: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Debounced key validation
// ---------------------------------------------------------------------------

/// Delay before a key edit triggers a validation probe. Typing a 40-char
/// key would otherwise fire 40 probes.
pub const VALIDATION_DEBOUNCE: Duration = Duration::from_millis(500);

/// Probe `key` for `id` after the debounce window, unless a newer edit has
/// superseded it.
///
/// Spawn this for every key edit; stale invocations notice the key changed
/// underneath them and abort without touching the registry, so the status
/// shown always belongs to the key currently stored.
pub async fn validate_key_debounced(
    registry: SharedRegistry,
    factory: Arc<dyn ProviderFactory>,
    id: ProviderId,
    key: String,
) {
    tokio::time::sleep(VALIDATION_DEBOUNCE).await;

    {
        let mut guard = registry.lock().unwrap();
        let stored = guard.config(id).map(|c| c.api_key.clone());
        if stored.as_deref() != Some(key.as_str()) {
            log::debug!("registry: validation for {id} superseded by a newer edit");
            return;
        }
        guard.begin_validation(id);
    }

    let valid = factory.create(id).validate_key(&key).await;

    let mut guard = registry.lock().unwrap();
    // Re-check: the key may have changed during the probe.
    let stored = guard.config(id).map(|c| c.api_key.clone());
    if stored.as_deref() == Some(key.as_str()) {
        guard.apply_validation(id, valid);
        log::info!(
            "registry: key for {id} is {}",
            if valid { "valid" } else { "invalid" }
        );
    } else {
        log::debug!("registry: discarding stale validation result for {id}");
    }
}

/// Fetch the model catalog for `id` and apply it.
pub async fn refresh_models(
    registry: SharedRegistry,
    factory: Arc<dyn ProviderFactory>,
    id: ProviderId,
) {
    let key = {
        let mut guard = registry.lock().unwrap();
        let Some(config) = guard.config(id) else {
            return;
        };
        let key = config.api_key.clone();
        guard.begin_models_fetch(id);
        key
    };

    let models = factory.create(id).list_models(&key).await;

    let mut guard = registry.lock().unwrap();
    guard.apply_models(id, models);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockFactory, MockProvider};
    use crate::store::{shared, MemoryStore};

    fn factory() -> MockFactory {
        MockFactory(MockProvider::ok("unused"))
    }

    fn fresh_registry() -> (ProviderRegistry, SharedStore) {
        let store = shared(MemoryStore::new());
        (ProviderRegistry::new(Arc::clone(&store)), store)
    }

    #[test]
    fn first_use_seeds_defaults_with_first_model_selected() {
        let (mut registry, _store) = fresh_registry();
        let f = factory();

        let config = registry.ensure_config(ProviderId::Groq, &f);
        assert_eq!(config.selected_model, "mock-1");
        assert_eq!(config.key_status, KeyStatus::Unverified);
        assert!(!config.has_key());
    }

    #[test]
    fn set_api_key_resets_status_to_unverified() {
        let (mut registry, _store) = fresh_registry();
        let f = factory();

        registry.set_api_key(ProviderId::OpenAi, "sk-abc", &f);
        registry.apply_validation(ProviderId::OpenAi, true);
        assert_eq!(
            registry.config(ProviderId::OpenAi).unwrap().key_status,
            KeyStatus::Valid
        );

        registry.set_api_key(ProviderId::OpenAi, "sk-new", &f);
        assert_eq!(
            registry.config(ProviderId::OpenAi).unwrap().key_status,
            KeyStatus::Unverified
        );
    }

    #[test]
    fn apply_models_resets_orphaned_selection() {
        let (mut registry, _store) = fresh_registry();
        let f = factory();

        registry.ensure_config(ProviderId::Gemini, &f);
        registry.apply_models(
            ProviderId::Gemini,
            vec![
                ModelEntry::new("m-a", "Model A"),
                ModelEntry::new("m-b", "Model B"),
            ],
        );

        let config = registry.config(ProviderId::Gemini).unwrap();
        // "mock-1" is gone from the catalog → reset to first entry.
        assert_eq!(config.selected_model, "m-a");
        assert!(!config.models_loading);
    }

    #[test]
    fn apply_models_keeps_valid_selection() {
        let (mut registry, _store) = fresh_registry();
        let f = factory();

        registry.ensure_config(ProviderId::Gemini, &f);
        registry.set_selected_model(ProviderId::Gemini, "mock-1");
        registry.apply_models(
            ProviderId::Gemini,
            vec![
                ModelEntry::new("other", "Other"),
                ModelEntry::new("mock-1", "Mock Model"),
            ],
        );

        assert_eq!(
            registry.config(ProviderId::Gemini).unwrap().selected_model,
            "mock-1"
        );
    }

    #[test]
    fn empty_catalog_is_ignored() {
        let (mut registry, _store) = fresh_registry();
        let f = factory();

        registry.ensure_config(ProviderId::OpenAi, &f);
        registry.apply_models(ProviderId::OpenAi, Vec::new());

        let config = registry.config(ProviderId::OpenAi).unwrap();
        assert!(!config.available_models.is_empty());
    }

    #[test]
    fn selecting_unknown_model_is_rejected() {
        let (mut registry, _store) = fresh_registry();
        let f = factory();

        registry.ensure_config(ProviderId::OpenAi, &f);
        registry.set_selected_model(ProviderId::OpenAi, "nope");
        assert_eq!(
            registry.config(ProviderId::OpenAi).unwrap().selected_model,
            "mock-1"
        );
    }

    #[test]
    fn active_credentials_requires_non_empty_key() {
        let (mut registry, _store) = fresh_registry();
        let f = factory();

        registry.ensure_config(ProviderId::OpenAi, &f);
        assert!(registry.active_credentials().is_none());

        registry.set_api_key(ProviderId::OpenAi, "  ", &f);
        assert!(registry.active_credentials().is_none());

        registry.set_api_key(ProviderId::OpenAi, "sk-live", &f);
        let (key, model) = registry.active_credentials().unwrap();
        assert_eq!(key, "sk-live");
        assert_eq!(model, "mock-1");
    }

    #[test]
    fn registry_round_trips_through_store() {
        let store = shared(MemoryStore::new());
        let f = factory();

        {
            let mut registry = ProviderRegistry::new(Arc::clone(&store));
            registry.set_api_key(ProviderId::Groq, "gsk-123", &f);
            registry.set_active(ProviderId::Groq, &f);
        }

        let reloaded = ProviderRegistry::load(store, &f);
        assert_eq!(reloaded.active(), ProviderId::Groq);
        let config = reloaded.config(ProviderId::Groq).unwrap();
        assert_eq!(config.api_key, "gsk-123");
        // Runtime fields must reset on load.
        assert_eq!(config.key_status, KeyStatus::Unverified);
        assert!(!config.models_loading);
    }

    #[test]
    fn corrupt_active_provider_falls_back_to_default() {
        let store = shared(MemoryStore::new());
        store
            .lock()
            .unwrap()
            .set(keys::ACTIVE_PROVIDER, serde_json::json!("clippy"))
            .unwrap();

        let reloaded = ProviderRegistry::load(store, &factory());
        assert_eq!(reloaded.active(), ProviderId::OpenAi);
    }

    #[tokio::test]
    async fn debounced_validation_applies_result() {
        let store = shared(MemoryStore::new());
        let f: Arc<dyn ProviderFactory> = Arc::new(factory());
        let registry = Arc::new(Mutex::new(ProviderRegistry::new(store)));

        registry
            .lock()
            .unwrap()
            .set_api_key(ProviderId::OpenAi, "sk-x", f.as_ref());

        tokio::time::pause();
        let task = tokio::spawn(validate_key_debounced(
            Arc::clone(&registry),
            Arc::clone(&f),
            ProviderId::OpenAi,
            "sk-x".into(),
        ));
        tokio::time::advance(VALIDATION_DEBOUNCE).await;
        task.await.unwrap();

        assert_eq!(
            registry
                .lock()
                .unwrap()
                .config(ProviderId::OpenAi)
                .unwrap()
                .key_status,
            KeyStatus::Valid
        );
    }

    #[tokio::test]
    async fn superseded_validation_never_touches_status() {
        let store = shared(MemoryStore::new());
        let f: Arc<dyn ProviderFactory> = Arc::new(factory());
        let registry = Arc::new(Mutex::new(ProviderRegistry::new(store)));

        registry
            .lock()
            .unwrap()
            .set_api_key(ProviderId::OpenAi, "sk-newer", f.as_ref());

        tokio::time::pause();
        // Probe for a key that has already been replaced.
        let task = tokio::spawn(validate_key_debounced(
            Arc::clone(&registry),
            Arc::clone(&f),
            ProviderId::OpenAi,
            "sk-stale".into(),
        ));
        tokio::time::advance(VALIDATION_DEBOUNCE).await;
        task.await.unwrap();

        assert_eq!(
            registry
                .lock()
                .unwrap()
                .config(ProviderId::OpenAi)
                .unwrap()
                .key_status,
            KeyStatus::Unverified
        );
    }
}
