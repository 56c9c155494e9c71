//! Directory-backed blob store
//!
//! Stores each blob as a file under a sharded, content-addressed layout:
//! `{root}/blobs/{hex[0..2]}/{hex[2..4]}/{hex}`
//!
//! Several processes can share one directory, which is how the CLI models a
//! remote store on a mounted or synced volume.

use crate::error::StorageError;
use crate::store::BlobBackend;
use crate::types::Hash;
use std::fs;
use std::path::{Path, PathBuf};

pub struct DirBlobBackend {
    root: PathBuf,
}

impl DirBlobBackend {
    /// Create a blob directory at the given root, creating it if needed
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        let blobs_dir = root.join("blobs");
        fs::create_dir_all(&blobs_dir).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to create blobs directory at {:?}: {}", blobs_dir, e),
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, hash: &Hash) -> PathBuf {
        let hex = hex::encode(hash);
        self.root
            .join("blobs")
            .join(&hex[0..2])
            .join(&hex[2..4])
            .join(hex)
    }
}

impl BlobBackend for DirBlobBackend {
    /// Uses atomic writes (write to .tmp, then rename). Existing blobs are left alone.
    fn put(&self, hash: &Hash, data: &[u8]) -> Result<(), StorageError> {
        let blob_path = self.blob_path(hash);
        if blob_path.exists() {
            return Ok(());
        }
        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to create parent directory {:?}: {}", parent, e),
                ))
            })?;
        }

        let temp_path = blob_path.with_extension(format!("{}.tmp", std::process::id()));
        fs::write(&temp_path, data).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to write blob to {:?}: {}", temp_path, e),
            ))
        })?;
        fs::rename(&temp_path, &blob_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to rename temp file to {:?}: {}", blob_path, e),
            ))
        })?;
        Ok(())
    }

    fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError> {
        let blob_path = self.blob_path(hash);
        match fs::read(&blob_path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to read blob from {:?}: {}", blob_path, e),
            ))),
        }
    }

    fn stat(&self, hash: &Hash) -> Result<bool, StorageError> {
        Ok(self.blob_path(hash).exists())
    }
}
