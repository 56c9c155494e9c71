//! Root heads
//!
//! Each filesystem name has two root histories in a versioned store:
//! - the WIP track (`local:root:NAME`), local commits not yet pushed;
//! - the remote track (`mirrorfs:root:NAME`), which lives in the remote store
//!   and is mirrored under the same key in the local store.

use crate::error::StorageError;
use crate::store::{KvEntry, Precondition, VersionedStore};
use crate::types::{Hash, Version};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const REMOTE_ROOT_PREFIX: &str = "mirrorfs:root:";
pub const WIP_ROOT_PREFIX: &str = "local:root:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Wip,
    Remote,
}

impl Track {
    pub fn key(self, name: &str) -> String {
        match self {
            Track::Wip => format!("{}{}", WIP_ROOT_PREFIX, name),
            Track::Remote => format!("{}{}", REMOTE_ROOT_PREFIX, name),
        }
    }
}

/// Committed root pointer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    #[serde(rename = "ref", with = "crate::types::hex_hash")]
    pub root_ref: Hash,
    /// Filled from the version entry on read.
    #[serde(default)]
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl Root {
    pub fn new(root_ref: Hash) -> Self {
        Self {
            root_ref,
            version: 0,
            comment: None,
            host: None,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, StorageError> {
        serde_json::to_vec(self)
            .map_err(|e| StorageError::Encoding(format!("Failed to encode root: {}", e)))
    }

    pub fn from_entry(entry: &KvEntry) -> Result<Self, StorageError> {
        let mut root: Root = serde_json::from_slice(&entry.data).map_err(|e| {
            StorageError::ProtocolError(format!(
                "Malformed root record at {}@{}: {}",
                entry.key, entry.version, e
            ))
        })?;
        root.version = entry.version;
        Ok(root)
    }
}

/// One root history in one versioned store
#[derive(Clone)]
pub struct RootHead {
    kv: Arc<dyn VersionedStore>,
    key: String,
}

impl RootHead {
    pub fn new(kv: Arc<dyn VersionedStore>, track: Track, name: &str) -> Self {
        Self {
            kv,
            key: track.key(name),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn latest(&self) -> Result<Option<Root>, StorageError> {
        self.kv
            .get(&self.key, None)?
            .map(|entry| Root::from_entry(&entry))
            .transpose()
    }

    pub fn latest_version(&self) -> Result<Option<Version>, StorageError> {
        Ok(self.kv.get(&self.key, None)?.map(|e| e.version))
    }

    /// Append `root`; the returned copy carries the version actually written.
    pub fn commit(
        &self,
        root: &Root,
        version: Option<Version>,
        precondition: Precondition,
    ) -> Result<Root, StorageError> {
        let entry = self
            .kv
            .put(&self.key, &root.to_bytes()?, version, precondition)?;
        Ok(Root {
            version: entry.version,
            ..root.clone()
        })
    }

    pub fn entries(
        &self,
        from: Version,
        to: Option<Version>,
        limit: Option<usize>,
    ) -> Result<Vec<KvEntry>, StorageError> {
        self.kv.list_versions(&self.key, from, to, limit)
    }

    pub fn history(&self) -> Result<Vec<Root>, StorageError> {
        self.entries(0, None, None)?
            .iter()
            .map(Root::from_entry)
            .collect()
    }

    /// Copy entries from another history at their original versions.
    /// Entries at or below this history's latest version are skipped.
    pub fn mirror(&self, entries: &[KvEntry]) -> Result<usize, StorageError> {
        let mut latest = self.latest_version()?;
        let mut copied = 0;
        for entry in entries {
            if latest.map_or(false, |l| entry.version <= l) {
                continue;
            }
            self.kv
                .put(&self.key, &entry.data, Some(entry.version), Precondition::Any)?;
            latest = Some(entry.version);
            copied += 1;
        }
        Ok(copied)
    }
}
