//! Node attribute record
//!
//! `Meta` is what gets canonically encoded and hashed for every node. A
//! directory's record references its children by hash; a file's record lists
//! its content chunks in offset order.

use crate::error::StorageError;
use crate::store::ContentStore;
use crate::tree::hasher;
use crate::types::{short_hex, Hash};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Extended attribute marking a node as published.
pub const PUBLIC_XATTR: &str = "public";

/// Default permission bits for directories.
pub const DIR_MODE: u32 = 0o755;

/// Default permission bits for files.
pub const FILE_MODE: u32 = 0o644;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Dir,
    File,
}

/// Reference to one content chunk of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    pub offset: u64,
    pub size: u64,
    #[serde(with = "crate::types::hex_hash")]
    pub hash: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub mode: u32,
    pub mtime: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub xattrs: BTreeMap<String, String>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        with = "crate::types::hex_hash_vec"
    )]
    pub children: Vec<Hash>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunks: Vec<ChunkRef>,
}

/// Current time in the format stored in `mtime`.
pub fn now_mtime() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Meta {
    pub fn new_dir(name: &str, mode: u32) -> Self {
        Self {
            name: name.to_string(),
            kind: NodeKind::Dir,
            mode,
            mtime: now_mtime(),
            size: 0,
            xattrs: BTreeMap::new(),
            children: Vec::new(),
            chunks: Vec::new(),
        }
    }

    pub fn new_file(name: &str, mode: u32) -> Self {
        Self {
            kind: NodeKind::File,
            ..Self::new_dir(name, mode)
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Dir
    }

    pub fn is_public(&self) -> bool {
        self.xattrs.get(PUBLIC_XATTR).map(String::as_str) == Some("1")
    }

    /// Copy of this record with its content references cleared.
    pub fn without_content(&self) -> Self {
        Self {
            size: 0,
            children: Vec::new(),
            chunks: Vec::new(),
            ..self.clone()
        }
    }

    /// Canonical bytes and their hash.
    pub fn encode(&self) -> Result<(Hash, Vec<u8>), StorageError> {
        hasher::hash_meta(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        serde_json::from_slice(bytes)
            .map_err(|e| StorageError::Encoding(format!("Failed to decode node record: {}", e)))
    }

    /// Encode, hash and store unless the blob already exists.
    pub fn store(&self, blobs: &ContentStore) -> Result<Hash, StorageError> {
        let (hash, bytes) = self.encode()?;
        blobs.put_if_absent(&hash, &bytes)?;
        Ok(hash)
    }

    /// Fetch and decode the record stored under `hash`. Bytes that are not a
    /// node record are a protocol error: some peer referenced them as one.
    pub fn load(blobs: &ContentStore, hash: &Hash) -> Result<Self, StorageError> {
        let bytes = blobs.get(hash)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::ProtocolError(format!(
                "Malformed node record {}: {}",
                short_hex(hash),
                e
            ))
        })
    }
}
