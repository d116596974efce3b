//! Microphone Volume Keeper - Library
//!
//! A system tray utility that keeps the microphone input volume at a
//! target level.
//!
//! ## Features
//!
//! - Periodic volume checks with correction when the level drifts
//! - PowerShell AudioDeviceCmdlets backend with a simulation fallback
//! - Recent event history and throttled correction reporting
//! - Settings persisted as JSON in the per-user config directory
//! - Status-colored tray icon with settings submenus

pub mod app;
pub mod audio;
pub mod monitor;
pub mod platform;
pub mod ui;

pub use app::{App, Notice};
pub use audio::{AudioMethod, BackendError, CmdletsBackend, SimulatedBackend, VolumeBackend};
pub use monitor::{EventKind, KeeperStatus, Monitor, StatusEvent};
pub use platform::{AppPaths, Settings, SettingsStore};
pub use ui::{MenuCommand, TrayView};
