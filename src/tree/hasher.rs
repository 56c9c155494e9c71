//! Canonical encoding and hashing for node records using BLAKE3

use crate::error::StorageError;
use crate::tree::meta::Meta;
use crate::types::Hash;
use blake3::Hasher;

/// Compute a generic hash of arbitrary data
pub fn compute_hash(data: &[u8]) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Canonical byte encoding of a node record
///
/// Field order is fixed by the struct, xattrs are a BTreeMap, and child hashes
/// are sorted here. Two records with the same attributes and the same child set
/// therefore encode identically no matter how the children were collected.
/// Chunk order is meaningful (offset order) and left as is.
pub fn encode_meta(meta: &Meta) -> Result<Vec<u8>, StorageError> {
    let mut canonical = meta.clone();
    canonical.children.sort_unstable();
    serde_json::to_vec(&canonical)
        .map_err(|e| StorageError::Encoding(format!("Failed to encode node record: {}", e)))
}

/// Encode a record and hash the encoding
pub fn hash_meta(meta: &Meta) -> Result<(Hash, Vec<u8>), StorageError> {
    let bytes = encode_meta(meta)?;
    Ok((compute_hash(&bytes), bytes))
}
