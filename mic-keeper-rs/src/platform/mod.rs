//! Platform module for files, logging and shell integration.
//!
//! This module contains settings persistence, per-user paths, file logging,
//! tray icon drawing and (on Windows) message boxes.

#[cfg(windows)]
pub mod dialogs;
pub mod icons;
pub mod logging;
pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    SettingChange, Settings, SettingsError, SettingsStore, SettingsUpdate, SharedSettings,
};
