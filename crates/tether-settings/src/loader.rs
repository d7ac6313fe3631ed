//! Layered settings: compiled defaults, then the user file merged over
//! them key by key, then `TETHER_*` environment variables. The result is
//! validated once all layers are applied.
//!
//! Merging walks objects recursively. A `null` in the user file keeps the
//! default; arrays and scalars replace the default outright.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::BridgeSettings;

/// `~/.tether/settings.json`, or under `/tmp` when `HOME` is unset.
pub fn settings_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".tether")
        .join("settings.json")
}

pub fn load_settings() -> Result<BridgeSettings> {
    load_settings_from_path(&settings_path())
}

/// A missing file means defaults. Unreadable files, bad JSON and values
/// that fail validation are errors.
pub fn load_settings_from_path(path: &Path) -> Result<BridgeSettings> {
    let mut settings = read_layers(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn read_layers(path: &Path) -> Result<BridgeSettings> {
    let mut layered = serde_json::to_value(BridgeSettings::default())?;

    match std::fs::read_to_string(path) {
        Ok(text) => {
            let user: Value = serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
                path: path.to_owned(),
                source,
            })?;
            debug!(path = %path.display(), "settings file applied");
            merge_into(&mut layered, user);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_owned(),
                source,
            })
        }
    }

    Ok(serde_json::from_value(layered)?)
}

/// Merge `overlay` into `base` in place.
pub fn merge_into(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(slot) => merge_into(slot, value),
                    None if value.is_null() => {}
                    None => {
                        let _ = base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Apply `TETHER_*` variables from the process environment. Unparsable or
/// out-of-range values are logged and skipped.
pub fn apply_env_overrides(settings: &mut BridgeSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

fn apply_overrides_from(settings: &mut BridgeSettings, lookup: impl Fn(&str) -> Option<String>) {
    let text = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let ranged_u64 = |name: &str, min: u64, max: u64| {
        text(name).and_then(|raw| checked(name, &raw, parse_in_range(&raw, min, max)))
    };

    if let Some(v) = text("TETHER_INSTALLED_VERSION") {
        settings.shell.installed_version = v;
    }
    if let Some(v) = text("TETHER_CONTENT_URL") {
        settings.shell.content_url = v;
    }
    if let Some(v) = text("TETHER_DEFAULT_ACCURACY").and_then(|raw| {
        let parsed = parse_in_range(&raw, 0.1, 10_000.0).filter(|n: &f64| n.is_finite());
        checked("TETHER_DEFAULT_ACCURACY", &raw, parsed)
    }) {
        settings.location.default_accuracy_m = v;
    }
    if let Some(v) = ranged_u64("TETHER_REFRESH_DELAY_MS", 0, 60_000) {
        settings.location.refresh_delay_ms = v;
    }
    if let Some(v) = ranged_u64("TETHER_FIX_TIMEOUT_MS", 100, 120_000) {
        settings.location.fix_timeout_ms = v;
    }
    if let Some(v) = text("TETHER_TEMP_DIR") {
        settings.lifecycle.temp_dir = PathBuf::from(v);
    }
    if let Some(v) = text("TETHER_CACHE_DIR") {
        settings.lifecycle.cache_dir = PathBuf::from(v);
    }
    if let Some(v) = text("TETHER_LOG_JSON")
        .and_then(|raw| checked("TETHER_LOG_JSON", &raw, parse_switch(&raw)))
    {
        settings.logging.json = v;
    }
}

fn checked<T>(name: &str, raw: &str, parsed: Option<T>) -> Option<T> {
    if parsed.is_none() {
        warn!(key = name, value = %raw, "ignoring invalid environment override");
    }
    parsed
}

/// `1/true/yes/on` or `0/false/no/off`, any case.
pub fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_in_range<T: FromStr + PartialOrd>(raw: &str, min: T, max: T) -> Option<T> {
    raw.trim()
        .parse::<T>()
        .ok()
        .filter(|n| *n >= min && *n <= max)
}
