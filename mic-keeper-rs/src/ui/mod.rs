//! UI module for the system tray.
//!
//! `menu` describes what the tray shows and is platform independent;
//! `tray` puts it on screen on Windows.

pub mod menu;
#[cfg(windows)]
pub mod tray;

pub use menu::{Choice, MenuCommand, TrayView};
#[cfg(windows)]
pub use tray::{TrayError, TrayEvent, TrayManager};
