//! Per-user file locations.

use super::settings::SETTINGS_FILE;
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the log.
pub const LOG_FILE: &str = "microphone_keeper.log";

/// Where the keeper keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub settings_path: PathBuf,
    pub log_path: PathBuf,
}

impl AppPaths {
    /// Resolve the per-user config and data directories, creating them.
    ///
    /// Falls back to the working directory if the platform has no home
    /// directory or the folders cannot be created.
    pub fn resolve() -> Self {
        match ProjectDirs::from("", "", "MicrophoneVolumeKeeper") {
            Some(dirs) => {
                let config_dir = ensure_dir(dirs.config_dir());
                let data_dir = ensure_dir(dirs.data_local_dir());
                Self::in_dirs(&config_dir, &data_dir)
            }
            None => Self::in_dirs(Path::new("."), Path::new(".")),
        }
    }

    /// Paths with both files placed in the given directories.
    pub fn in_dirs(config_dir: &Path, data_dir: &Path) -> Self {
        Self {
            settings_path: config_dir.join(SETTINGS_FILE),
            log_path: data_dir.join(LOG_FILE),
        }
    }
}

fn ensure_dir(dir: &Path) -> PathBuf {
    match fs::create_dir_all(dir) {
        Ok(()) => dir.to_path_buf(),
        Err(_) => PathBuf::from("."),
    }
}
