//! Application state and lifecycle management.
//!
//! Owns the settings store and the monitor, turns tray commands into
//! actions, and derives everything the tray and status report display.

use crate::audio::{detect_backend, AudioMethod, CmdletsBackend, VolumeBackend};
use crate::monitor::{EventKind, KeeperStatus, Monitor};
use crate::platform::{AppPaths, Settings, SettingsStore, SettingsUpdate};
use crate::ui::menu::{self, ellipsize, MenuCommand, TrayView, EVENT_LABEL_MAX};

/// Application name used in window titles and the tooltip.
pub const APP_TITLE: &str = "Microphone Volume Keeper";

/// A message the shell should show to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: String,
    pub is_error: bool,
}

/// Main application state.
pub struct App {
    settings: SettingsStore,
    monitor: Monitor,

    /// Recording devices offered in the device submenu
    devices: Vec<String>,

    /// Whether the application should exit
    pub should_exit: bool,
}

impl App {
    /// Create the application from a settings store and a backend.
    ///
    /// Monitoring is not started.
    pub fn new(settings: SettingsStore, backend: Box<dyn VolumeBackend>) -> Self {
        let monitor = Monitor::new(backend, settings.shared());
        let devices = monitor.list_devices().unwrap_or_else(|e| {
            tracing::warn!("Could not load audio devices: {}", e);
            Vec::new()
        });

        Self {
            settings,
            monitor,
            devices,
            should_exit: false,
        }
    }

    /// Load settings from `paths` and detect the volume backend.
    pub fn initialize(paths: &AppPaths) -> Self {
        let settings = SettingsStore::open(&paths.settings_path);
        let target = settings.current().target_volume;
        let backend = detect_backend(CmdletsBackend::is_available, target);
        Self::new(settings, backend)
    }

    pub fn settings(&self) -> Settings {
        self.settings.current()
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    pub fn start(&mut self) -> bool {
        self.monitor.start()
    }

    pub fn stop(&mut self) {
        self.monitor.stop();
    }

    pub fn toggle(&mut self) {
        self.monitor.toggle();
    }

    /// Replace the settings, persist them and record what changed.
    pub fn apply_settings(&mut self, new_settings: Settings) -> SettingsUpdate {
        let update = self.settings.apply(new_settings);

        if update.saved.is_ok() {
            self.monitor.record(EventKind::Settings, "Settings saved");
        }
        if !update.changes.is_empty() {
            self.monitor.record(EventKind::Config, update.summary());
        }

        update
    }

    /// Act on a tray command. Returns a message to show, if any.
    pub fn handle_command(&mut self, command: MenuCommand) -> Option<Notice> {
        let mut next = self.settings();
        match command {
            MenuCommand::ShowStatus => return Some(self.status_report()),
            MenuCommand::ToggleMonitoring => {
                self.toggle();
                return None;
            }
            MenuCommand::Exit => {
                self.stop();
                self.should_exit = true;
                return None;
            }
            MenuCommand::SelectDevice(device) => next.device = device,
            MenuCommand::SetTargetVolume(volume) => next.target_volume = volume,
            MenuCommand::SetCheckInterval(seconds) => next.check_interval = seconds,
        }

        let update = self.apply_settings(next);
        Some(settings_notice(&update))
    }

    pub fn status(&self) -> KeeperStatus {
        self.monitor.status()
    }

    /// Status summary shown on left click.
    pub fn status_report(&self) -> Notice {
        let state = self.monitor.snapshot();
        let settings = self.settings();
        let status = KeeperStatus::project(state.running, state.audio_method);
        let method = describe_method(state.audio_method);
        let device = ellipsize(&settings.device, 30);

        match state.last_volume {
            Some(volume) => Notice {
                title: APP_TITLE.to_string(),
                body: format!(
                    "Status: {} {}\n\
                     Audio Method: {}\n\
                     Selected Device: {}\n\
                     Current Volume: {}%\n\
                     Target Volume: {}%\n\
                     Sampling Rate: {}\n\
                     Corrections: {}\n\n\
                     💡 Left click: show status\n\
                     💡 Right click: menu with settings",
                    status.glyph(),
                    status.label(),
                    method,
                    device,
                    volume,
                    settings.target_volume,
                    settings.interval_label(),
                    state.correction_count,
                ),
                is_error: false,
            },
            None => Notice {
                title: APP_TITLE.to_string(),
                body: format!(
                    "Error: Cannot retrieve microphone volume!\n\n\
                     Current Method: {}\n\
                     Selected Device: {}\n\n\
                     Suggested Solutions:\n\
                     • Install AudioDeviceCmdlets:\n  \
                     Install-Module AudioDeviceCmdlets\n\
                     • Choose different device in settings\n\
                     • Run as administrator",
                    method, device,
                ),
                is_error: true,
            },
        }
    }

    /// Everything the tray should currently show.
    pub fn tray_view(&self) -> TrayView {
        let state = self.monitor.snapshot();
        let settings = self.settings();
        let status = KeeperStatus::project(state.running, state.audio_method);
        let method = state.audio_method.map(|m| m.name()).unwrap_or("unknown");

        TrayView {
            status,
            activity: state.running && state.correction_count > 0,
            tooltip: format!(
                "{} ({}, {}%)",
                APP_TITLE,
                status.label(),
                settings.target_volume
            ),
            toggle_label: menu::toggle_label(status),
            diagnostics: vec![
                format!("🔧 {}", method),
                format!("🎤 {}", ellipsize(&settings.device, menu::DEVICE_LABEL_MAX)),
                format!(
                    "🎯 Target: {}% | ⏱️ Rate: {}",
                    settings.target_volume,
                    settings.interval_label()
                ),
            ],
            recent_events: self
                .monitor
                .recent_events()
                .iter()
                .map(|event| ellipsize(&event.to_string(), EVENT_LABEL_MAX))
                .collect(),
            device_choices: menu::device_choices(&self.devices, &settings.device),
            target_choices: menu::target_choices(settings.target_volume),
            interval_choices: menu::interval_choices(settings.check_interval),
        }
    }

    /// Stop monitoring before the process exits.
    pub fn shutdown(&mut self) {
        if self.monitor.is_running() {
            self.stop();
        }
    }
}

fn describe_method(method: Option<AudioMethod>) -> String {
    match method {
        Some(m @ AudioMethod::Cmdlets) => format!("🔵 {}", m.description()),
        Some(m @ AudioMethod::Simulation) => format!("⚪ {}", m.description()),
        None => "unknown".to_string(),
    }
}

fn settings_notice(update: &SettingsUpdate) -> Notice {
    let settings = &update.settings;
    let mut body = format!(
        "New Settings:\n\n\
         🎤 Device: {}\n\
         🎯 Target Volume: {}%\n\
         ⏱️ Sampling Rate: {}\n\n\
         Changes are active immediately!",
        settings.device,
        settings.target_volume,
        settings.interval_label()
    );

    match &update.saved {
        Ok(()) => Notice {
            title: "Settings Saved".to_string(),
            body,
            is_error: false,
        },
        Err(e) => {
            body.push_str(&format!("\n\nThe settings could not be saved:\n{}", e));
            Notice {
                title: "Settings Not Saved".to_string(),
                body,
                is_error: true,
            }
        }
    }
}
