//! Settings types. Every field has a compiled default; user files only
//! need to name what they override.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for one bridge instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    /// Host shell settings.
    pub shell: ShellSettings,
    /// Location tracking settings.
    pub location: LocationSettings,
    /// Photo capture and compression settings.
    pub capture: CaptureSettings,
    /// Foreground/background handling.
    pub lifecycle: LifecycleSettings,
    /// Optional location-history persistence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<HistorySettings>,
    /// Logging output.
    pub logging: LoggingSettings,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            shell: ShellSettings::default(),
            location: LocationSettings::default(),
            capture: CaptureSettings::default(),
            lifecycle: LifecycleSettings::default(),
            history: None,
            logging: LoggingSettings::default(),
        }
    }
}

impl BridgeSettings {
    /// Reject combinations the coordinators cannot work with.
    pub fn validate(&self) -> Result<()> {
        let c = &self.capture;
        if c.quality_step == 0 {
            return Err(SettingsError::Invalid("qualityStep must be > 0".into()));
        }
        if c.quality_floor > c.start_quality || c.start_quality > 100 {
            return Err(SettingsError::Invalid(format!(
                "quality range {}..={} is empty or above 100",
                c.quality_floor, c.start_quality
            )));
        }
        for (name, v) in [("main", &c.main), ("thumbnail", &c.thumbnail)] {
            if v.max_width == 0 || v.max_height == 0 || v.max_bytes == 0 {
                return Err(SettingsError::Invalid(format!(
                    "{name} variant bounds must be non-zero"
                )));
            }
        }
        if self.location.default_accuracy_m <= 0.0 {
            return Err(SettingsError::Invalid(
                "defaultAccuracyM must be > 0".into(),
            ));
        }
        if self.shell.outbound_queue == 0 {
            return Err(SettingsError::Invalid("outboundQueue must be > 0".into()));
        }
        Ok(())
    }
}

/// Identity of the native container.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShellSettings {
    /// Installed build version compared against `Check_Version`.
    pub installed_version: String,
    /// URL the content surface loads.
    pub content_url: String,
    /// Capacity of the outbound message queue.
    pub outbound_queue: usize,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            installed_version: env!("CARGO_PKG_VERSION").to_string(),
            content_url: "https://entity-marking.web.app/".to_string(),
            outbound_queue: 256,
        }
    }
}

/// Location tracking settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationSettings {
    /// Accuracy gate applied when `track_location` carries none.
    pub default_accuracy_m: f64,
    /// Minimum displacement between periodic fixes.
    pub min_displacement_m: f64,
    /// Regular watch interval in milliseconds.
    pub interval_ms: u64,
    /// Fastest watch interval in milliseconds.
    pub fastest_interval_ms: u64,
    /// Request high-accuracy fixes.
    pub high_accuracy: bool,
    /// Deadline for a one-shot fix in milliseconds.
    pub fix_timeout_ms: u64,
    /// Pause between stop and restart for `Get_Location`.
    pub refresh_delay_ms: u64,
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            default_accuracy_m: 20.0,
            min_displacement_m: 10.0,
            interval_ms: 10_000,
            fastest_interval_ms: 6_000,
            high_accuracy: true,
            fix_timeout_ms: 5_000,
            refresh_delay_ms: 2_000,
        }
    }
}

/// Bounds for one compressed image variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantBudget {
    pub max_width: u32,
    pub max_height: u32,
    pub max_bytes: u64,
}

/// Photo capture and compression settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureSettings {
    /// JPEG quality hint for the raw capture.
    pub capture_quality: u8,
    /// First quality tried by the compression loop.
    pub start_quality: u8,
    /// Quality decrement per attempt.
    pub quality_step: u8,
    /// The loop stops once quality would drop below this.
    pub quality_floor: u8,
    /// Main image budget.
    pub main: VariantBudget,
    /// Thumbnail budget.
    pub thumbnail: VariantBudget,
    /// Minimum spacing between two sent capture results.
    pub confirm_cooldown_ms: u64,
    /// Directory for resized outputs. Defaults to the temp root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            capture_quality: 80,
            start_quality: 85,
            quality_step: 10,
            quality_floor: 30,
            main: VariantBudget {
                max_width: 800,
                max_height: 800,
                max_bytes: 50 * 1024,
            },
            thumbnail: VariantBudget {
                max_width: 180,
                max_height: 180,
                max_bytes: 15 * 1024,
            },
            confirm_cooldown_ms: 3_000,
            output_dir: None,
        }
    }
}

/// Foreground/background handling.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LifecycleSettings {
    /// Transient temp root, purged on foreground re-entry.
    pub temp_dir: PathBuf,
    /// Transient cache root, purged on foreground re-entry.
    pub cache_dir: PathBuf,
    /// How long after the camera closes a foreground re-entry still skips
    /// the reload.
    pub camera_grace_ms: u64,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        let base = std::env::temp_dir().join("tether");
        Self {
            temp_dir: base.join("tmp"),
            cache_dir: base.join("cache"),
            camera_grace_ms: 1_500,
        }
    }
}

/// Location-history persistence target.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySettings {
    /// SQLite database path.
    pub db_path: PathBuf,
    /// Subject the device reports for.
    pub subject_id: String,
    /// Group (region) key the subject belongs to.
    pub group_key: String,
}

/// Logging output.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level (`RUST_LOG` wins).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        BridgeSettings::default().validate().unwrap();
    }

    #[test]
    fn default_budgets() {
        let c = CaptureSettings::default();
        assert_eq!(c.main.max_bytes, 51_200);
        assert_eq!(c.thumbnail.max_bytes, 15_360);
        assert_eq!((c.main.max_width, c.main.max_height), (800, 800));
        assert_eq!((c.thumbnail.max_width, c.thumbnail.max_height), (180, 180));
        assert_eq!((c.start_quality, c.quality_step, c.quality_floor), (85, 10, 30));
    }

    #[test]
    fn camel_case_wire_names() {
        let v = serde_json::to_value(BridgeSettings::default()).unwrap();
        assert_eq!(v["location"]["defaultAccuracyM"], 20.0);
        assert_eq!(v["location"]["refreshDelayMs"], 2000);
        assert_eq!(v["capture"]["confirmCooldownMs"], 3000);
        assert!(v.get("history").is_none());
    }

    #[test]
    fn zero_step_rejected() {
        let mut s = BridgeSettings::default();
        s.capture.quality_step = 0;
        assert!(matches!(s.validate(), Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn inverted_quality_range_rejected() {
        let mut s = BridgeSettings::default();
        s.capture.quality_floor = 90;
        assert!(s.validate().is_err());
    }

    #[test]
    fn zero_budget_rejected() {
        let mut s = BridgeSettings::default();
        s.capture.thumbnail.max_bytes = 0;
        assert!(s.validate().is_err());
    }
}
