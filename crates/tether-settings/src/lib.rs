//! # tether-settings
//!
//! Configuration for the tether bridge. Layers, lowest priority first:
//! compiled [`BridgeSettings::default()`], the user file at
//! `~/.tether/settings.json`, then `TETHER_*` environment variables.
//!
//! Settings are passed explicitly to each bridge instance.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, merge_into, settings_path};
pub use types::*;
