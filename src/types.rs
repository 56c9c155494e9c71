//! Core type definitions shared across the filesystem engine.

use crate::error::StorageError;

/// BLAKE3 digest identifying a blob (node record or file chunk).
pub type Hash = [u8; 32];

/// In-memory node identity handed to the kernel-facing layer.
pub type Inode = u64;

/// Version stamped on every committed root.
pub type Version = u64;

/// Inode of the working tree root. Stable across tree replacements.
pub const ROOT_INODE: Inode = 1;

/// Render a hash as lowercase hex.
pub fn hash_to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

/// Short form used in log lines.
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..6])
}

/// Parse a 64-character hex string into a hash.
pub fn parse_hash(s: &str) -> Result<Hash, StorageError> {
    let bytes = hex::decode(s.trim())
        .map_err(|e| StorageError::ProtocolError(format!("Invalid hash '{}': {}", s, e)))?;
    if bytes.len() != 32 {
        return Err(StorageError::ProtocolError(format!(
            "Invalid hash length {} for '{}'",
            bytes.len(),
            s
        )));
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    Ok(hash)
}

/// Serde adapter that stores a [`Hash`] as a hex string.
pub mod hex_hash {
    use super::Hash;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_hash(&s).map_err(D::Error::custom)
    }
}

/// Serde adapter for a list of hashes stored as hex strings.
pub mod hex_hash_vec {
    use super::Hash;
    use serde::ser::SerializeSeq;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hashes: &[Hash], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(hashes.len()))?;
        for hash in hashes {
            seq.serialize_element(&hex::encode(hash))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Hash>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| super::parse_hash(s).map_err(D::Error::custom))
            .collect()
    }
}
