//! Settings persisted to a JSON file.
//!
//! The record is flat: device, target volume, check interval. Missing or
//! invalid fields fall back to their defaults one by one.

use crate::audio::DEFAULT_DEVICE;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// File name of the settings record.
pub const SETTINGS_FILE: &str = "microphone_keeper_settings.json";

/// Allowed range of the target volume, in percent.
pub const TARGET_VOLUME_RANGE: (u8, u8) = (1, 100);

/// Characters of a device name kept in a change summary.
const DEVICE_SUMMARY_CHARS: usize = 20;

/// Allowed range of the check interval, in seconds.
pub const CHECK_INTERVAL_RANGE: (f64, f64) = (0.1, 5.0);

/// Settings shared between the settings flow and the monitor thread.
pub type SharedSettings = Arc<RwLock<Settings>>;

/// User settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Recording device name, or "Default (Automatic)"
    #[serde(default = "default_device", deserialize_with = "lenient_device")]
    pub device: String,

    /// Volume the monitor keeps the microphone at (1-100)
    #[serde(default = "default_target_volume", deserialize_with = "lenient_target_volume")]
    pub target_volume: u8,

    /// Seconds between volume checks (0.1-5.0)
    #[serde(default = "default_check_interval", deserialize_with = "lenient_check_interval")]
    pub check_interval: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device: default_device(),
            target_volume: default_target_volume(),
            check_interval: default_check_interval(),
        }
    }
}

impl Settings {
    /// Pull every field into its allowed range.
    pub fn clamped(mut self) -> Self {
        if self.device.trim().is_empty() {
            self.device = default_device();
        }
        self.target_volume = self
            .target_volume
            .clamp(TARGET_VOLUME_RANGE.0, TARGET_VOLUME_RANGE.1);
        self.check_interval = if self.check_interval.is_finite() {
            self.check_interval
                .clamp(CHECK_INTERVAL_RANGE.0, CHECK_INTERVAL_RANGE.1)
        } else {
            default_check_interval()
        };
        self
    }

    /// Check interval as a sleep duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.check_interval)
    }

    /// Check interval for display, e.g. "0.5s" or "1.0s".
    pub fn interval_label(&self) -> String {
        format_interval(self.check_interval)
    }

    /// Differences from `previous`, in display order.
    pub fn changes_from(&self, previous: &Settings) -> Vec<SettingChange> {
        let mut changes = Vec::new();
        if previous.target_volume != self.target_volume {
            changes.push(SettingChange::TargetVolume(self.target_volume));
        }
        if previous.check_interval != self.check_interval {
            changes.push(SettingChange::CheckInterval(self.check_interval));
        }
        if previous.device != self.device {
            changes.push(SettingChange::Device(self.device.clone()));
        }
        changes
    }
}

/// Format seconds the way the tray shows them.
pub fn format_interval(seconds: f64) -> String {
    if seconds.fract() == 0.0 {
        format!("{:.1}s", seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// One changed setting.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingChange {
    TargetVolume(u8),
    CheckInterval(f64),
    Device(String),
}

impl std::fmt::Display for SettingChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingChange::TargetVolume(v) => write!(f, "Target: {}%", v),
            SettingChange::CheckInterval(s) => write!(f, "Rate: {}", format_interval(*s)),
            SettingChange::Device(name) => {
                if name.chars().count() > DEVICE_SUMMARY_CHARS {
                    let head: String = name.chars().take(DEVICE_SUMMARY_CHARS).collect();
                    write!(f, "Device: {}...", head)
                } else {
                    write!(f, "Device: {}", name)
                }
            }
        }
    }
}

fn default_device() -> String {
    DEFAULT_DEVICE.to_string()
}

fn default_target_volume() -> u8 {
    100
}

fn default_check_interval() -> f64 {
    0.5
}

fn lenient_device<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(default_device))
}

fn lenient_target_volume<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let (min, max) = TARGET_VOLUME_RANGE;
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_f64()
        .filter(|v| v.fract() == 0.0 && *v >= min as f64 && *v <= max as f64)
        .map(|v| v as u8)
        .unwrap_or_else(default_target_volume))
}

fn lenient_check_interval<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let (min, max) = CHECK_INTERVAL_RANGE;
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_f64()
        .filter(|v| (min..=max).contains(v))
        .unwrap_or_else(default_check_interval))
}

/// Settings store error types.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result of applying new settings.
#[derive(Debug)]
pub struct SettingsUpdate {
    /// Settings now in effect
    pub settings: Settings,

    /// What changed relative to the previous settings
    pub changes: Vec<SettingChange>,

    /// Outcome of persisting the new settings
    pub saved: Result<(), SettingsError>,
}

impl SettingsUpdate {
    /// Changes joined for a status event, e.g. "Target: 80%, Rate: 1.2s".
    pub fn summary(&self) -> String {
        self.changes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// File-backed settings with a shared in-memory copy.
pub struct SettingsStore {
    path: PathBuf,
    current: SharedSettings,
}

impl SettingsStore {
    /// Create a store for `path` holding default settings in memory.
    ///
    /// Does not touch the file - call `load()` after.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: Arc::new(RwLock::new(Settings::default())),
        }
    }

    /// Create a store and load it from `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = Self::new(path);
        store.load();
        store
    }

    /// Get the settings file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Handle to the in-memory settings for other threads.
    pub fn shared(&self) -> SharedSettings {
        Arc::clone(&self.current)
    }

    /// Snapshot of the settings in effect.
    pub fn current(&self) -> Settings {
        self.current.read().clone()
    }

    /// Read the settings file, merging it over the defaults.
    ///
    /// A missing file yields the defaults.
    pub fn read_file(&self) -> Result<Settings, SettingsError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Settings::default()),
            Err(source) => {
                return Err(SettingsError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Load settings from disk into memory, falling back to defaults.
    pub fn load(&self) -> Settings {
        let settings = match self.read_file() {
            Ok(settings) => {
                tracing::info!("Settings loaded: {:?}", settings);
                settings
            }
            Err(e) => {
                tracing::warn!("Could not load settings: {}", e);
                Settings::default()
            }
        };

        *self.current.write() = settings.clone();
        settings
    }

    /// Write `settings` to disk atomically.
    ///
    /// Writes to a temp file first, then renames over the target.
    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let content = serde_json::to_string_pretty(settings)?;
        self.atomic_write(&content)
            .map_err(|source| SettingsError::Write {
                path: self.path.clone(),
                source,
            })?;

        tracing::info!("Settings saved: {:?}", settings);
        Ok(())
    }

    /// Replace the in-memory settings and persist them.
    ///
    /// The new settings take effect even if saving fails.
    pub fn apply(&self, new_settings: Settings) -> SettingsUpdate {
        let new_settings = new_settings.clamped();

        let changes = {
            let mut current = self.current.write();
            let changes = new_settings.changes_from(&current);
            *current = new_settings.clone();
            changes
        };

        let saved = self.save(&new_settings);
        if let Err(ref e) = saved {
            tracing::error!("Could not save settings: {}", e);
        }

        SettingsUpdate {
            settings: new_settings,
            changes,
            saved,
        }
    }

    fn atomic_write(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("json.tmp");

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.path).inspect_err(|_| {
            let _ = fs::remove_file(&temp_path);
        })
    }
}
