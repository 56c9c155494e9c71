//! Error types for the synchronizing filesystem.

use crate::types::{Hash, Inode, Version};
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob not found: {}", hex::encode(.0))]
    BlobNotFound(Hash),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Version conflict on {key}: expected {expected:?}, found {actual:?}")]
    VersionConflict {
        key: String,
        expected: Option<Version>,
        actual: Option<Version>,
    },

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors surfaced by filesystem, sync and control operations
#[derive(Debug, Error)]
pub enum FsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Exists(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("File too large: write of {len} bytes at offset {offset}")]
    FileTooLarge { offset: u64, len: u64 },

    #[error("File not open: inode {0}")]
    NotOpen(Inode),

    #[error("No such attribute: {0}")]
    NoXattr(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Out of sync: remote version {remote:?} is behind last observed version {mirror}")]
    OutOfSync {
        mirror: Version,
        remote: Option<Version>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl FsError {
    /// Map to the errno a kernel adapter should reply with.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::Exists(_) => libc::EEXIST,
            FsError::NotADirectory(_) => libc::ENOTDIR,
            FsError::IsADirectory(_) => libc::EISDIR,
            FsError::DirectoryNotEmpty(_) => libc::ENOTEMPTY,
            FsError::PermissionDenied(_) => libc::EPERM,
            FsError::FileTooLarge { .. } => libc::EFBIG,
            FsError::NotOpen(_) => libc::EBADF,
            FsError::NoXattr(_) => libc::ENODATA,
            FsError::InvalidArgument(_) => libc::EINVAL,
            FsError::Storage(StorageError::BlobNotFound(_))
            | FsError::Storage(StorageError::KeyNotFound(_)) => libc::ENOENT,
            _ => libc::EIO,
        }
    }

    /// True for optimistic-concurrency and regression failures.
    pub fn is_sync_conflict(&self) -> bool {
        matches!(
            self,
            FsError::OutOfSync { .. } | FsError::Storage(StorageError::VersionConflict { .. })
        )
    }
}

impl From<config::ConfigError> for FsError {
    fn from(err: config::ConfigError) -> Self {
        FsError::ConfigError(err.to_string())
    }
}
