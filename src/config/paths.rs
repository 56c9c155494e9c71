//! XDG-style locations for config and data

use crate::error::FsError;
use directories::ProjectDirs;
use std::path::PathBuf;

const APP_DIR: &str = "mirrorfs";

/// `$XDG_CONFIG_HOME`, or `~/.config` when unset.
pub fn config_home() -> Result<PathBuf, FsError> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".config"))
        .ok_or_else(|| FsError::ConfigError("Neither XDG_CONFIG_HOME nor HOME is set".to_string()))
}

/// Global config file: `<config_home>/mirrorfs/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    config_home()
        .ok()
        .map(|dir| dir.join(APP_DIR).join("config.toml"))
}

/// Base directory for per-filesystem local data.
pub fn data_home() -> Result<PathBuf, FsError> {
    ProjectDirs::from("", "", APP_DIR)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| FsError::ConfigError("Could not determine a data directory".to_string()))
}
