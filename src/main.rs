//! Application entry point — dictapad.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Open the key-value store and load registry + history from it.
//! 4. Create the tokio runtime (multi-thread, 2 workers).
//! 5. Build the trigger coordinator over the live shared state.
//! 6. Spawn the hotkey listener thread.
//! 7. Run the event loop: each hotkey press toggles the coordinator;
//!    accepted transcripts are optionally copied to the clipboard.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use dictapad::{
    audio::{CaptureBackend, CpalCaptureBackend},
    clipboard,
    config::{AppConfig, AppPaths},
    history::HistoryStore,
    hotkey::{parse_key, HotkeyEvent, HotkeyListener},
    pipeline::{new_shared_state, ToggleOutcome, TranscriptStatus, TriggerCoordinator},
    provider::{HttpProviderFactory, ProviderFactory},
    registry::{refresh_models, ProviderRegistry},
    store::{shared, JsonFileStore, MemoryStore},
};

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("dictapad starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Store, registry, history
    let paths = AppPaths::new();
    let store = match JsonFileStore::open(paths.store_file.clone()) {
        Ok(store) => shared(store),
        Err(e) => {
            // A corrupt store file must not prevent startup; run without
            // persistence for this session rather than overwrite the file.
            log::warn!(
                "could not open {} ({e}); running without persistence",
                paths.store_file.display()
            );
            shared(MemoryStore::new())
        }
    };

    let factory: Arc<dyn ProviderFactory> = Arc::new(HttpProviderFactory::new());
    let registry = Arc::new(Mutex::new(ProviderRegistry::load(
        Arc::clone(&store),
        factory.as_ref(),
    )));
    let history = Arc::new(Mutex::new(HistoryStore::load(Arc::clone(&store))));

    // 4. Tokio runtime (2 workers: event loop + network)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 5. Coordinator over live shared state
    let state = new_shared_state();
    let capture: Arc<dyn CaptureBackend> = Arc::new(CpalCaptureBackend::new());
    let coordinator = Arc::new(TriggerCoordinator::new(
        state,
        Arc::clone(&registry),
        history,
        Arc::clone(&factory),
        capture,
        &config.trigger,
    ));

    // Refresh the active provider's model catalog in the background when a
    // key is already configured.
    {
        let active = registry.lock().unwrap().active();
        let has_key = registry
            .lock()
            .unwrap()
            .config(active)
            .is_some_and(|c| c.has_key());
        if has_key {
            rt.spawn(refresh_models(
                Arc::clone(&registry),
                Arc::clone(&factory),
                active,
            ));
        }
    }

    // 6. Hotkey listener thread
    let (hotkey_tx, hotkey_rx) = mpsc::channel::<HotkeyEvent>(16);
    let key = parse_key(&config.hotkey.toggle_key).unwrap_or_else(|| {
        log::warn!(
            "unknown hotkey {:?}; falling back to F9",
            config.hotkey.toggle_key
        );
        rdev::Key::F9
    });
    let _listener = HotkeyListener::start(key, hotkey_tx);
    log::info!("hotkey registered: {}", config.hotkey.toggle_key);

    // 7. Event loop
    rt.block_on(run_event_loop(
        coordinator,
        hotkey_rx,
        config.copy_to_clipboard,
    ));

    Ok(())
}

/// Drive the coordinator from hotkey events until the channel closes.
async fn run_event_loop(
    coordinator: Arc<TriggerCoordinator>,
    mut events: mpsc::Receiver<HotkeyEvent>,
    copy_to_clipboard: bool,
) {
    while let Some(HotkeyEvent::Toggle) = events.recv().await {
        match coordinator.toggle().await {
            ToggleOutcome::Started => {
                log::info!("recording… press the hotkey again to stop");
            }
            ToggleOutcome::Finished(TranscriptStatus::Merged(text)) => {
                log::info!("transcript merged ({} chars)", text.chars().count());
                if copy_to_clipboard {
                    let result =
                        tokio::task::spawn_blocking(move || clipboard::write_text(&text)).await;
                    match result {
                        Ok(Ok(())) => log::debug!("transcript copied to clipboard"),
                        Ok(Err(e)) => log::warn!("clipboard write failed: {e}"),
                        Err(e) => log::warn!("clipboard task panicked: {e}"),
                    }
                }
            }
            ToggleOutcome::Finished(TranscriptStatus::NoSpeech) => {
                log::info!("no speech detected");
            }
            ToggleOutcome::Finished(TranscriptStatus::Failed(kind)) => {
                log::warn!("dictation cycle failed: {kind:?}");
            }
            ToggleOutcome::Rejected(kind) => {
                log::warn!("start refused: {kind:?}");
            }
            ToggleOutcome::Ignored => {}
        }
    }

    log::info!("hotkey channel closed, shutting down");
}
