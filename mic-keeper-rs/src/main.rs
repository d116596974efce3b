#![windows_subsystem = "windows"]

use anyhow::Result;
use mic_keeper_rs::app::{App, Notice};
use mic_keeper_rs::platform::{logging, AppPaths};

fn main() -> Result<()> {
    let paths = AppPaths::resolve();
    if let Err(e) = logging::init_file_logging(&paths.log_path) {
        logging::init_stderr_logging();
        tracing::warn!("File logging unavailable: {:#}", e);
    }
    tracing::info!("Microphone Volume Keeper starting");

    let mut app = App::initialize(&paths);
    app.start();

    let result = run(&mut app);
    app.shutdown();

    match &result {
        Ok(()) => tracing::info!("Microphone Volume Keeper exited"),
        Err(e) => tracing::error!("Microphone Volume Keeper failed: {:#}", e),
    }
    result
}

#[cfg(windows)]
fn run(app: &mut App) -> Result<()> {
    use mic_keeper_rs::app::APP_TITLE;
    use mic_keeper_rs::platform::dialogs;
    use mic_keeper_rs::ui::{TrayEvent, TrayManager};
    use std::time::Duration;
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE,
    };

    let mut tray = TrayManager::new();
    if let Err(e) = tray.create(&app.tray_view()) {
        dialogs::show_error(APP_TITLE, &format!("Could not create the tray icon:\n{}", e));
        return Err(e.into());
    }

    let mut msg = MSG::default();
    while !app.should_exit {
        // Pump Win32 messages so the tray icon receives its events
        unsafe {
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).into() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        tray.process_events();
        while let Ok(event) = tray.events().try_recv() {
            let notice = match event {
                TrayEvent::LeftClick => Some(app.status_report()),
                TrayEvent::Command(command) => app.handle_command(command),
            };
            if let Some(notice) = notice {
                show_notice(&notice);
            }
        }

        if let Err(e) = tray.refresh(&app.tray_view()) {
            tracing::warn!("Tray refresh failed: {}", e);
        }

        std::thread::sleep(Duration::from_millis(50));
    }

    tray.destroy();
    Ok(())
}

#[cfg(windows)]
fn show_notice(notice: &Notice) {
    use mic_keeper_rs::platform::dialogs;

    if notice.is_error {
        dialogs::show_error(&notice.title, &notice.body);
    } else {
        dialogs::show_info(&notice.title, &notice.body);
    }
}

/// Headless mode: commands are read line by line from stdin.
#[cfg(not(windows))]
fn run(app: &mut App) -> Result<()> {
    use mic_keeper_rs::ui::MenuCommand;
    use std::io::{self, BufRead};

    println!("Commands: status, start, stop, quit");
    for line in io::stdin().lock().lines() {
        match line?.trim() {
            "status" => show_notice(&app.status_report()),
            "start" => {
                if !app.start() {
                    println!("Already running");
                }
            }
            "stop" => app.stop(),
            "quit" | "exit" => {
                app.handle_command(MenuCommand::Exit);
            }
            "" => {}
            other => println!("Unknown command: {}", other),
        }

        if app.should_exit {
            break;
        }
    }
    Ok(())
}

#[cfg(not(windows))]
fn show_notice(notice: &Notice) {
    let view = notice.body.lines().collect::<Vec<_>>().join("\n  ");
    if notice.is_error {
        eprintln!("[{}]\n  {}", notice.title, view);
    } else {
        println!("[{}]\n  {}", notice.title, view);
    }
}
