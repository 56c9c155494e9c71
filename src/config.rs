//! Configuration System
//!
//! Layered configuration for a mirrorfs instance: built-in defaults, the
//! global user file, workspace files and `MIRRORFS__*` environment variables,
//! merged in that order.

use crate::error::FsError;
use crate::fs::FsOptions;
use crate::logging::LoggingConfig;
use crate::tree::chunker::DEFAULT_CHUNK_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod facade;
mod merge;
mod paths;
mod sources;

pub use facade::ConfigLoader;

/// XDG path helpers
pub mod xdg {
    pub use super::paths::*;
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Filesystem name; selects the root history keys.
    #[serde(default = "default_name")]
    pub name: String,

    /// Recorded on committed roots.
    #[serde(default)]
    pub hostname: Option<String>,

    /// Reject mutation while the remote mount is active.
    #[serde(default)]
    pub immutable: bool,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub files: FilesConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_name() -> String {
    "default".to_string()
}

/// Local storage location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Defaults to the platform data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Directory holding the local database for filesystem `name`.
    pub fn resolve_data_dir(&self, name: &str) -> Result<PathBuf, FsError> {
        let base = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => paths::data_home()?,
        };
        Ok(base.join(name))
    }
}

/// Remote store location and publishing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Directory holding the remote blobs and version database.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Base URL for links to public nodes.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl RemoteConfig {
    /// Remote directory, falling back to `remote/` next to the local data.
    pub fn resolve_path(&self, data_dir: &Path) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| data_dir.join("remote"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Open-file buffers above this many bytes spill to a temp file.
    #[serde(default = "default_spill_threshold")]
    pub spill_threshold: Option<u64>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_spill_threshold() -> Option<u64> {
    Some(64 * 1024 * 1024)
}

fn default_max_file_size() -> u64 {
    i64::MAX as u64
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            spill_threshold: default_spill_threshold(),
            max_file_size: default_max_file_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between background syncs; 0 disables the timer.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// How long shutdown waits for running syncs.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_drain_timeout_secs() -> u64 {
    30
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            hostname: None,
            immutable: false,
            storage: StorageConfig::default(),
            remote: RemoteConfig::default(),
            files: FilesConfig::default(),
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Name(String),
    Files(String),
    Remote(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Name(msg) => write!(f, "Name: {}", msg),
            ValidationError::Files(msg) => write!(f, "Files: {}", msg),
            ValidationError::Remote(msg) => write!(f, "Remote: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl MirrorConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(ValidationError::Name("cannot be empty".to_string()));
        } else if self.name.contains(['/', ':', '\0']) {
            errors.push(ValidationError::Name(format!(
                "'{}' may not contain '/', ':' or NUL",
                self.name
            )));
        }

        if self.files.chunk_size == 0 {
            errors.push(ValidationError::Files("chunk_size must be positive".to_string()));
        }
        if self.files.spill_threshold == Some(0) {
            errors.push(ValidationError::Files(
                "spill_threshold must be positive when set".to_string(),
            ));
        }
        if self.files.max_file_size == 0 {
            errors.push(ValidationError::Files("max_file_size must be positive".to_string()));
        }

        if let Some(url) = &self.remote.public_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(ValidationError::Remote(format!(
                    "public_url '{}' must be an http(s) URL",
                    url
                )));
            }
        }
        if let Some(path) = &self.remote.path {
            if path.as_os_str().is_empty() {
                errors.push(ValidationError::Remote("path cannot be empty".to_string()));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Runtime options for [`crate::fs::MirrorFs::open`].
    pub fn fs_options(&self) -> FsOptions {
        FsOptions {
            name: self.name.clone(),
            immutable: self.immutable,
            hostname: self.hostname.clone(),
            public_url: self.remote.public_url.clone(),
            chunk_size: self.files.chunk_size,
            spill_threshold: self.files.spill_threshold,
            max_file_size: self.files.max_file_size,
        }
    }

    /// Render as TOML, the format the config files use.
    pub fn to_toml(&self) -> Result<String, FsError> {
        toml::to_string_pretty(self).map_err(|e| FsError::ConfigError(e.to_string()))
    }
}
