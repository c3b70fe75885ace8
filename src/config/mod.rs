//! Configuration module for dictapad.
//!
//! Provides `AppConfig` (static settings, TOML-persisted), `AppPaths` for
//! cross-platform data directories, and the sub-configs for each subsystem.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, HotkeyConfig, TriggerConfig};
