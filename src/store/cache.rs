//! Two-tier content store
//!
//! A local blob backend in front of a remote one. Reads that miss locally are
//! served by the remote, verified against their hash and written through to the
//! local tier. The local tier only grows; nothing is evicted.

use crate::error::StorageError;
use crate::store::BlobBackend;
use crate::tree::hasher::compute_hash;
use crate::types::{short_hex, Hash};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct ContentStore {
    local: Arc<dyn BlobBackend>,
    remote: Arc<dyn BlobBackend>,
}

impl ContentStore {
    pub fn new(local: Arc<dyn BlobBackend>, remote: Arc<dyn BlobBackend>) -> Self {
        Self { local, remote }
    }

    /// Write to the local tier only.
    pub fn put(&self, hash: &Hash, data: &[u8]) -> Result<(), StorageError> {
        self.local.put(hash, data)
    }

    pub fn put_remote(&self, hash: &Hash, data: &[u8]) -> Result<(), StorageError> {
        self.remote.put(hash, data)
    }

    /// True if the blob exists locally or remotely.
    pub fn stat(&self, hash: &Hash) -> Result<bool, StorageError> {
        if self.local.stat(hash)? {
            return Ok(true);
        }
        self.remote.stat(hash)
    }

    pub fn stat_remote(&self, hash: &Hash) -> Result<bool, StorageError> {
        self.remote.stat(hash)
    }

    /// Put into the local tier unless the blob already exists in either tier.
    /// Returns true when a write happened.
    pub fn put_if_absent(&self, hash: &Hash, data: &[u8]) -> Result<bool, StorageError> {
        if self.stat(hash)? {
            return Ok(false);
        }
        self.put(hash, data)?;
        Ok(true)
    }

    /// Local read with remote fallback and write-through.
    pub fn get(&self, hash: &Hash) -> Result<Vec<u8>, StorageError> {
        if let Some(data) = self.local.get(hash)? {
            return Ok(data);
        }
        let data = self
            .remote
            .get(hash)?
            .ok_or(StorageError::BlobNotFound(*hash))?;
        let actual = compute_hash(&data);
        if actual != *hash {
            return Err(StorageError::ProtocolError(format!(
                "remote blob {} hashed to {}",
                hex::encode(hash),
                hex::encode(actual)
            )));
        }
        debug!(blob = %short_hex(hash), size = data.len(), "Filled local cache from remote");
        self.local.put(hash, &data)?;
        Ok(data)
    }
}
