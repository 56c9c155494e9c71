//! In-memory stores
//!
//! Used for tests, benches and as a stand-in remote when none is configured.

use crate::error::StorageError;
use crate::store::{next_version, BlobBackend, KvEntry, Precondition, VersionedStore};
use crate::tree::hasher::compute_hash;
use crate::types::{Hash, Version};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

/// HashMap-backed blob store that counts writes.
#[derive(Default)]
pub struct MemoryBlobBackend {
    blobs: RwLock<HashMap<Hash, Vec<u8>>>,
    puts: AtomicUsize,
}

impl MemoryBlobBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Total number of `put` calls, including rewrites of existing blobs.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Hashes currently stored.
    pub fn hashes(&self) -> Vec<Hash> {
        self.blobs.read().keys().copied().collect()
    }

    /// Overwrite a blob without any checks. Lets tests simulate corruption.
    pub fn insert_raw(&self, hash: Hash, data: Vec<u8>) {
        self.blobs.write().insert(hash, data);
    }
}

impl BlobBackend for MemoryBlobBackend {
    fn put(&self, hash: &Hash, data: &[u8]) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.blobs.write().insert(*hash, data.to_vec());
        Ok(())
    }

    fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.blobs.read().get(hash).cloned())
    }

    fn stat(&self, hash: &Hash) -> Result<bool, StorageError> {
        Ok(self.blobs.read().contains_key(hash))
    }
}

/// BTreeMap-backed version history per key.
#[derive(Default)]
pub struct MemoryVersionedStore {
    keys: RwLock<HashMap<String, BTreeMap<Version, (Hash, Vec<u8>)>>>,
}

impl MemoryVersionedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every version of `key` above `version`. Lets tests simulate a
    /// remote that lost history.
    pub fn truncate_after(&self, key: &str, version: Version) {
        if let Some(history) = self.keys.write().get_mut(key) {
            history.retain(|v, _| *v <= version);
        }
    }
}

fn entry(key: &str, version: Version, hash: &Hash, data: &[u8]) -> KvEntry {
    KvEntry {
        key: key.to_string(),
        version,
        hash: *hash,
        data: data.to_vec(),
    }
}

impl VersionedStore for MemoryVersionedStore {
    fn get(&self, key: &str, version: Option<Version>) -> Result<Option<KvEntry>, StorageError> {
        let keys = self.keys.read();
        let Some(history) = keys.get(key) else {
            return Ok(None);
        };
        let found = match version {
            None => history.iter().next_back(),
            Some(v) => history.get_key_value(&v),
        };
        Ok(found.map(|(v, (hash, data))| entry(key, *v, hash, data)))
    }

    fn put(
        &self,
        key: &str,
        data: &[u8],
        version: Option<Version>,
        precondition: Precondition,
    ) -> Result<KvEntry, StorageError> {
        let mut keys = self.keys.write();
        let history = keys.entry(key.to_string()).or_default();
        let latest = history.keys().next_back().copied();
        precondition.check(key, latest)?;
        let version = next_version(key, latest, version)?;
        let hash = compute_hash(data);
        history.insert(version, (hash, data.to_vec()));
        Ok(entry(key, version, &hash, data))
    }

    fn list_versions(
        &self,
        key: &str,
        from: Version,
        to: Option<Version>,
        limit: Option<usize>,
    ) -> Result<Vec<KvEntry>, StorageError> {
        let keys = self.keys.read();
        let Some(history) = keys.get(key) else {
            return Ok(Vec::new());
        };
        let to = to.unwrap_or(u64::MAX);
        if from > to {
            return Ok(Vec::new());
        }
        Ok(history
            .range(from..=to)
            .take(limit.unwrap_or(usize::MAX))
            .map(|(v, (hash, data))| entry(key, *v, hash, data))
            .collect())
    }
}
