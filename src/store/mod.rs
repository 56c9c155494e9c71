//! Storage seams
//!
//! Two collaborator interfaces back the filesystem:
//! - [`BlobBackend`]: content-addressed bytes keyed by hash, with an existence check.
//! - [`VersionedStore`]: append-only per-key version history used for root pointers.
//!
//! The same traits describe both the local side and the remote side; the
//! [`cache::ContentStore`] layers a local backend over a remote one.

pub mod blob_dir;
pub mod cache;
pub mod memory;
pub mod persistence;

pub use blob_dir::DirBlobBackend;
pub use cache::ContentStore;
pub use memory::{MemoryBlobBackend, MemoryVersionedStore};
pub use persistence::{SledBlobBackend, SledVersionedStore};

use crate::error::StorageError;
use crate::types::{Hash, Version};
use serde::{Deserialize, Serialize};

/// Content-addressed blob backend
pub trait BlobBackend: Send + Sync {
    fn put(&self, hash: &Hash, data: &[u8]) -> Result<(), StorageError>;
    fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError>;
    fn stat(&self, hash: &Hash) -> Result<bool, StorageError>;
}

/// One entry of a key's version history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvEntry {
    pub key: String,
    pub version: Version,
    #[serde(with = "crate::types::hex_hash")]
    pub hash: Hash,
    pub data: Vec<u8>,
}

/// Optimistic-concurrency guard for [`VersionedStore::put`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// No check on the current latest version.
    Any,
    /// The key must have no history yet.
    Absent,
    /// The latest version must equal this one.
    Latest(Version),
}

impl Precondition {
    /// Expected-prior precondition derived from a last known version.
    pub fn expecting(version: Option<Version>) -> Self {
        match version {
            Some(v) => Precondition::Latest(v),
            None => Precondition::Absent,
        }
    }

    /// Check against the key's actual latest version.
    pub fn check(&self, key: &str, latest: Option<Version>) -> Result<(), StorageError> {
        let ok = match self {
            Precondition::Any => true,
            Precondition::Absent => latest.is_none(),
            Precondition::Latest(v) => latest == Some(*v),
        };
        if ok {
            Ok(())
        } else {
            Err(StorageError::VersionConflict {
                key: key.to_string(),
                expected: match self {
                    Precondition::Latest(v) => Some(*v),
                    _ => None,
                },
                actual: latest,
            })
        }
    }
}

/// Versioned key-value store interface
///
/// Versions for a key are strictly increasing. `put` with `version = None`
/// appends at `latest + 1`; an explicit version must exceed the latest one.
pub trait VersionedStore: Send + Sync {
    /// Fetch a version of `key`; `None` selects the latest.
    fn get(&self, key: &str, version: Option<Version>) -> Result<Option<KvEntry>, StorageError>;

    fn put(
        &self,
        key: &str,
        data: &[u8],
        version: Option<Version>,
        precondition: Precondition,
    ) -> Result<KvEntry, StorageError>;

    /// Ordered entries with `from <= version <= to` (unbounded when `to` is `None`).
    fn list_versions(
        &self,
        key: &str,
        from: Version,
        to: Option<Version>,
        limit: Option<usize>,
    ) -> Result<Vec<KvEntry>, StorageError>;
}

/// Resolve the version a put should be written at, enforcing monotonicity.
pub(crate) fn next_version(
    key: &str,
    latest: Option<Version>,
    requested: Option<Version>,
) -> Result<Version, StorageError> {
    match requested {
        None => Ok(latest.map_or(1, |v| v + 1)),
        Some(v) if latest.map_or(true, |l| v > l) => Ok(v),
        Some(v) => Err(StorageError::VersionConflict {
            key: key.to_string(),
            expected: Some(v),
            actual: latest,
        }),
    }
}
