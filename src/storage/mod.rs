//! Persistent storage
//!
//! Client-side persistence for preferences, consent flags and dismissal timers.

pub mod flags;
pub mod preferences;

use std::path::PathBuf;

use directories::ProjectDirs;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Data directory unavailable")]
    NoDataDir,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Resolve the per-user data directory (e.g. `~/.local/share/aihub`)
pub fn get_data_dir() -> Result<PathBuf, StorageError> {
    if let Ok(dir) = std::env::var("AIHUB_DATA_DIR") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    ProjectDirs::from("dev", "aihub", "aihub")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(StorageError::NoDataDir)
}
