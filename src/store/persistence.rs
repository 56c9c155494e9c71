//! Sled-backed blob and version stores

use crate::error::StorageError;
use crate::store::{next_version, BlobBackend, KvEntry, Precondition, VersionedStore};
use crate::tree::hasher::compute_hash;
use crate::types::{Hash, Version};
use bincode;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sled;
use std::path::Path;

const BLOB_TREE: &str = "blobs";
const VERSION_TREE: &str = "versions";

fn sled_error(context: &str, e: sled::Error) -> StorageError {
    StorageError::IoError(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("{}: {}", context, e),
    ))
}

/// Open (or create) a sled database at the given path
pub fn open_db<P: AsRef<Path>>(path: P) -> Result<sled::Db, StorageError> {
    sled::open(path).map_err(|e| sled_error("Failed to open sled database", e))
}

/// Sled-based implementation of BlobBackend
pub struct SledBlobBackend {
    tree: sled::Tree,
}

impl SledBlobBackend {
    /// Create a new SledBlobBackend in its own database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::from_db(&open_db(path)?)
    }

    /// Use the blob tree of an already opened database
    pub fn from_db(db: &sled::Db) -> Result<Self, StorageError> {
        let tree = db
            .open_tree(BLOB_TREE)
            .map_err(|e| sled_error("Failed to open blob tree", e))?;
        Ok(Self { tree })
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.tree
            .flush()
            .map_err(|e| sled_error("Failed to flush blob tree", e))?;
        Ok(())
    }
}

impl BlobBackend for SledBlobBackend {
    fn put(&self, hash: &Hash, data: &[u8]) -> Result<(), StorageError> {
        self.tree
            .insert(hash.as_slice(), data)
            .map_err(|e| sled_error("Failed to put blob", e))?;
        Ok(())
    }

    fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError> {
        let value = self
            .tree
            .get(hash.as_slice())
            .map_err(|e| sled_error("Failed to get blob", e))?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn stat(&self, hash: &Hash) -> Result<bool, StorageError> {
        self.tree
            .contains_key(hash.as_slice())
            .map_err(|e| sled_error("Failed to stat blob", e))
    }
}

/// On-disk value of one version entry
#[derive(Debug, Serialize, Deserialize)]
struct StoredVersion {
    hash: Hash,
    data: Vec<u8>,
}

/// Sled-based implementation of VersionedStore
///
/// Entries live under `key \0 version_be`, so a prefix scan walks one key's
/// history in version order.
pub struct SledVersionedStore {
    tree: sled::Tree,
    write_lock: Mutex<()>,
}

impl SledVersionedStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::from_db(&open_db(path)?)
    }

    pub fn from_db(db: &sled::Db) -> Result<Self, StorageError> {
        let tree = db
            .open_tree(VERSION_TREE)
            .map_err(|e| sled_error("Failed to open version tree", e))?;
        Ok(Self {
            tree,
            write_lock: Mutex::new(()),
        })
    }

    fn prefix(key: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(key.len() + 1);
        prefix.extend_from_slice(key.as_bytes());
        prefix.push(0);
        prefix
    }

    fn entry_key(key: &str, version: Version) -> Vec<u8> {
        let mut k = Self::prefix(key);
        k.extend_from_slice(&version.to_be_bytes());
        k
    }

    fn decode(key: &str, raw_key: &[u8], value: &[u8]) -> Result<KvEntry, StorageError> {
        let prefix_len = key.len() + 1;
        if raw_key.len() != prefix_len + 8 {
            return Err(StorageError::Encoding(format!(
                "Malformed version key for {}",
                key
            )));
        }
        let mut be = [0u8; 8];
        be.copy_from_slice(&raw_key[prefix_len..]);
        let stored: StoredVersion = bincode::deserialize(value).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Failed to deserialize version entry: {}", e),
            ))
        })?;
        Ok(KvEntry {
            key: key.to_string(),
            version: u64::from_be_bytes(be),
            hash: stored.hash,
            data: stored.data,
        })
    }

    fn latest(&self, key: &str) -> Result<Option<KvEntry>, StorageError> {
        match self.tree.scan_prefix(Self::prefix(key)).next_back() {
            Some(item) => {
                let (k, v) = item.map_err(|e| sled_error("Failed to scan versions", e))?;
                Ok(Some(Self::decode(key, &k, &v)?))
            }
            None => Ok(None),
        }
    }
}

impl VersionedStore for SledVersionedStore {
    fn get(&self, key: &str, version: Option<Version>) -> Result<Option<KvEntry>, StorageError> {
        match version {
            None => self.latest(key),
            Some(v) => {
                let raw_key = Self::entry_key(key, v);
                let value = self
                    .tree
                    .get(&raw_key)
                    .map_err(|e| sled_error("Failed to get version entry", e))?;
                value
                    .map(|value| Self::decode(key, &raw_key, &value))
                    .transpose()
            }
        }
    }

    fn put(
        &self,
        key: &str,
        data: &[u8],
        version: Option<Version>,
        precondition: Precondition,
    ) -> Result<KvEntry, StorageError> {
        let _guard = self.write_lock.lock();
        let latest = self.latest(key)?.map(|e| e.version);
        precondition.check(key, latest)?;
        let version = next_version(key, latest, version)?;

        let stored = StoredVersion {
            hash: compute_hash(data),
            data: data.to_vec(),
        };
        let value = bincode::serialize(&stored).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Failed to serialize version entry: {}", e),
            ))
        })?;
        self.tree
            .insert(Self::entry_key(key, version), value)
            .map_err(|e| sled_error("Failed to put version entry", e))?;
        self.tree
            .flush()
            .map_err(|e| sled_error("Failed to flush version tree", e))?;

        Ok(KvEntry {
            key: key.to_string(),
            version,
            hash: stored.hash,
            data: stored.data,
        })
    }

    fn list_versions(
        &self,
        key: &str,
        from: Version,
        to: Option<Version>,
        limit: Option<usize>,
    ) -> Result<Vec<KvEntry>, StorageError> {
        let start = Self::entry_key(key, from);
        let end = Self::entry_key(key, to.unwrap_or(u64::MAX));
        let mut entries = Vec::new();
        for item in self.tree.range(start..=end) {
            if limit.map_or(false, |l| entries.len() >= l) {
                break;
            }
            let (k, v) = item.map_err(|e| sled_error("Failed to iterate versions", e))?;
            entries.push(Self::decode(key, &k, &v)?);
        }
        Ok(entries)
    }
}
