//! Tray menu model.
//!
//! Everything the tray shows, computed from application state, plus the
//! commands its entries trigger. Kept free of windowing types so it can be
//! built and checked on any platform.

use crate::audio::DEFAULT_DEVICE;
use crate::monitor::KeeperStatus;
use crate::platform::settings::format_interval;

/// Target volumes offered in the settings submenu.
pub const TARGET_PRESETS: [u8; 9] = [50, 60, 70, 75, 80, 85, 90, 95, 100];

/// Check intervals offered in the settings submenu, in seconds.
pub const INTERVAL_PRESETS: [f64; 6] = [0.1, 0.2, 0.5, 1.0, 2.0, 5.0];

/// Longest recent-event line shown in the menu.
pub const EVENT_LABEL_MAX: usize = 40;

/// Longest device name shown in the diagnostics.
pub const DEVICE_LABEL_MAX: usize = 28;

/// Action requested from the tray.
#[derive(Debug, Clone, PartialEq)]
pub enum MenuCommand {
    ShowStatus,
    ToggleMonitoring,
    SelectDevice(String),
    SetTargetVolume(u8),
    SetCheckInterval(f64),
    Exit,
}

/// One entry of a settings submenu.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice<T> {
    pub label: String,
    pub value: T,
    pub selected: bool,
}

/// Everything the tray icon and menu display.
#[derive(Debug, Clone, PartialEq)]
pub struct TrayView {
    pub status: KeeperStatus,

    /// Corrections have happened while running
    pub activity: bool,

    pub tooltip: String,

    /// Start/stop entry, e.g. "🟢 Stop"
    pub toggle_label: String,

    /// Read-only lines: backend, device, target and rate
    pub diagnostics: Vec<String>,

    /// Recent events, newest first
    pub recent_events: Vec<String>,

    pub device_choices: Vec<Choice<String>>,
    pub target_choices: Vec<Choice<u8>>,
    pub interval_choices: Vec<Choice<f64>>,
}

/// Shorten `text` to at most `max` characters, ending in "...".
pub fn ellipsize(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut short: String = text.chars().take(keep).collect();
    short.push_str("...");
    short
}

/// Start/stop label for the current status.
pub fn toggle_label(status: KeeperStatus) -> String {
    let action = if status.is_running() { "Stop" } else { "Start" };
    format!("{} {}", status.glyph(), action)
}

/// Target volume choices, including `current` if it is not a preset.
pub fn target_choices(current: u8) -> Vec<Choice<u8>> {
    let mut values: Vec<u8> = TARGET_PRESETS.to_vec();
    if !values.contains(&current) {
        values.push(current);
        values.sort_unstable();
    }
    values
        .into_iter()
        .map(|value| Choice {
            label: format!("{}%", value),
            value,
            selected: value == current,
        })
        .collect()
}

/// Check interval choices, including `current` if it is not a preset.
pub fn interval_choices(current: f64) -> Vec<Choice<f64>> {
    let mut values: Vec<f64> = INTERVAL_PRESETS.to_vec();
    if !values.iter().any(|v| *v == current) {
        values.push(current);
        values.sort_by(|a, b| a.total_cmp(b));
    }
    values
        .into_iter()
        .map(|value| Choice {
            label: format_interval(value),
            value,
            selected: value == current,
        })
        .collect()
}

/// Device choices: the automatic default first, then known devices.
///
/// The configured device stays selectable even when it is not listed.
pub fn device_choices(devices: &[String], current: &str) -> Vec<Choice<String>> {
    let mut names = vec![DEFAULT_DEVICE.to_string()];
    for name in devices {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    if !names.iter().any(|n| n == current) {
        names.push(current.to_string());
    }

    names
        .into_iter()
        .map(|name| Choice {
            label: name.clone(),
            selected: name == current,
            value: name,
        })
        .collect()
}
