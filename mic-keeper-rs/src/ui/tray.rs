//! System tray icon management.
//!
//! Manages the system tray icon, tooltip, and context menu.

use super::menu::{Choice, MenuCommand, TrayView};
use crate::platform::icons;
use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use thiserror::Error;
use tray_icon::{
    menu::{CheckMenuItem, Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem, Submenu},
    TrayIcon, TrayIconBuilder, TrayIconEvent,
};

/// Events from the system tray.
#[derive(Debug, Clone, PartialEq)]
pub enum TrayEvent {
    /// Left-click on tray icon
    LeftClick,

    /// Menu item selected
    Command(MenuCommand),
}

/// Tray service error types.
#[derive(Debug, Error)]
pub enum TrayError {
    #[error("Failed to create tray icon: {0}")]
    CreateFailed(String),

    #[error("Failed to load icon resource: {0}")]
    IconLoadFailed(String),

    #[error("Tray icon not initialized")]
    NotInitialized,

    #[error("Failed to create menu: {0}")]
    MenuFailed(String),
}

fn menu_err(e: tray_icon::menu::Error) -> TrayError {
    TrayError::MenuFailed(e.to_string())
}

/// System tray manager.
pub struct TrayManager {
    tray_icon: Option<TrayIcon>,
    event_sender: Sender<TrayEvent>,
    event_receiver: Receiver<TrayEvent>,
    commands: HashMap<MenuId, MenuCommand>,
    shown: Option<TrayView>,
}

impl TrayManager {
    /// Create a new TrayManager.
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self {
            tray_icon: None,
            event_sender: sender,
            event_receiver: receiver,
            commands: HashMap::new(),
            shown: None,
        }
    }

    /// Create and show the tray icon.
    pub fn create(&mut self, view: &TrayView) -> Result<(), TrayError> {
        let icon = icons::create_status_icon(view.status, view.activity)
            .map_err(TrayError::IconLoadFailed)?;
        let menu = self.build_menu(view)?;

        let tray_icon = TrayIconBuilder::new()
            .with_icon(icon)
            .with_tooltip(&view.tooltip)
            .with_menu(Box::new(menu))
            .build()
            .map_err(|e| TrayError::CreateFailed(e.to_string()))?;

        self.tray_icon = Some(tray_icon);
        self.shown = Some(view.clone());

        Ok(())
    }

    /// Bring the icon, tooltip and menu in line with `view`.
    ///
    /// Does nothing if the view is unchanged since the last refresh.
    pub fn refresh(&mut self, view: &TrayView) -> Result<(), TrayError> {
        if self.shown.as_ref() == Some(view) {
            return Ok(());
        }

        let menu = self.build_menu(view)?;
        let icon = icons::create_status_icon(view.status, view.activity)
            .map_err(TrayError::IconLoadFailed)?;

        let tray = self.tray_icon.as_mut().ok_or(TrayError::NotInitialized)?;
        tray.set_icon(Some(icon))
            .map_err(|e| TrayError::CreateFailed(e.to_string()))?;
        tray.set_tooltip(Some(&view.tooltip))
            .map_err(|e| TrayError::CreateFailed(e.to_string()))?;
        tray.set_menu(Some(Box::new(menu)));

        self.shown = Some(view.clone());
        Ok(())
    }

    /// Rebuild the context menu, remembering which id maps to which command.
    fn build_menu(&mut self, view: &TrayView) -> Result<Menu, TrayError> {
        self.commands.clear();
        let menu = Menu::new();

        let status_item = MenuItem::new("📊 Show Status", true, None);
        self.commands
            .insert(status_item.id().clone(), MenuCommand::ShowStatus);
        menu.append(&status_item).map_err(menu_err)?;
        menu.append(&PredefinedMenuItem::separator()).map_err(menu_err)?;

        let toggle_item = MenuItem::new(&view.toggle_label, true, None);
        self.commands
            .insert(toggle_item.id().clone(), MenuCommand::ToggleMonitoring);
        menu.append(&toggle_item).map_err(menu_err)?;

        let settings = Submenu::new("⚙️ Settings", true);
        let devices = self.choice_submenu("🎤 Device", &view.device_choices, |name| {
            MenuCommand::SelectDevice(name.clone())
        })?;
        let targets = self.choice_submenu("🎯 Target Volume", &view.target_choices, |v| {
            MenuCommand::SetTargetVolume(*v)
        })?;
        let intervals = self.choice_submenu("⏱️ Sampling Rate", &view.interval_choices, |s| {
            MenuCommand::SetCheckInterval(*s)
        })?;
        settings.append(&devices).map_err(menu_err)?;
        settings.append(&targets).map_err(menu_err)?;
        settings.append(&intervals).map_err(menu_err)?;
        menu.append(&settings).map_err(menu_err)?;

        menu.append(&PredefinedMenuItem::separator()).map_err(menu_err)?;
        for line in &view.diagnostics {
            menu.append(&MenuItem::new(line, false, None))
                .map_err(menu_err)?;
        }

        if !view.recent_events.is_empty() {
            menu.append(&PredefinedMenuItem::separator()).map_err(menu_err)?;
            menu.append(&MenuItem::new("📋 Recent Events:", false, None))
                .map_err(menu_err)?;
            for event in &view.recent_events {
                menu.append(&MenuItem::new(format!("  {}", event), false, None))
                    .map_err(menu_err)?;
            }
        }

        menu.append(&PredefinedMenuItem::separator()).map_err(menu_err)?;
        let exit_item = MenuItem::new("❌ Exit", true, None);
        self.commands.insert(exit_item.id().clone(), MenuCommand::Exit);
        menu.append(&exit_item).map_err(menu_err)?;

        Ok(menu)
    }

    fn choice_submenu<T, F>(
        &mut self,
        title: &str,
        choices: &[Choice<T>],
        command: F,
    ) -> Result<Submenu, TrayError>
    where
        F: Fn(&T) -> MenuCommand,
    {
        let submenu = Submenu::new(title, true);
        for choice in choices {
            let item = CheckMenuItem::new(&choice.label, true, choice.selected, None);
            self.commands
                .insert(item.id().clone(), command(&choice.value));
            submenu.append(&item).map_err(menu_err)?;
        }
        Ok(submenu)
    }

    /// Process tray icon events. Call this from the event loop.
    pub fn process_events(&self) {
        while let Ok(event) = TrayIconEvent::receiver().try_recv() {
            if let TrayIconEvent::Click {
                button: tray_icon::MouseButton::Left,
                button_state: tray_icon::MouseButtonState::Up,
                ..
            } = event
            {
                let _ = self.event_sender.send(TrayEvent::LeftClick);
            }
        }

        while let Ok(event) = MenuEvent::receiver().try_recv() {
            if let Some(command) = self.commands.get(&event.id) {
                let _ = self.event_sender.send(TrayEvent::Command(command.clone()));
            }
        }
    }

    /// Get the event receiver for tray events.
    pub fn events(&self) -> &Receiver<TrayEvent> {
        &self.event_receiver
    }

    /// Destroy the tray icon.
    pub fn destroy(&mut self) {
        self.tray_icon = None;
        self.shown = None;
    }
}

impl Default for TrayManager {
    fn default() -> Self {
        Self::new()
    }
}
