//! Chunked file reader and writer
//!
//! File content is split into fixed-size chunks. Each chunk is stored as its
//! own blob; the file record lists `(offset, size, hash)` for every chunk.

use crate::error::StorageError;
use crate::store::ContentStore;
use crate::tree::hasher::compute_hash;
use crate::tree::meta::{now_mtime, ChunkRef, Meta, NodeKind};
use crate::types::Hash;
use std::io::Read;

pub const DEFAULT_CHUNK_SIZE: usize = 512 * 1024;

/// Turns a byte stream into chunk blobs plus a file record
pub struct FileWriter<'a> {
    blobs: &'a ContentStore,
    chunk_size: usize,
}

impl<'a> FileWriter<'a> {
    pub fn new(blobs: &'a ContentStore, chunk_size: usize) -> Self {
        Self {
            blobs,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Chunk `reader` and return the stored record and its hash.
    ///
    /// Name, mode and xattrs come from `template`; mtime is refreshed.
    pub fn write<R: Read>(&self, template: &Meta, mut reader: R) -> Result<(Hash, Meta), StorageError> {
        let mut meta = template.without_content();
        meta.kind = NodeKind::File;
        meta.mtime = now_mtime();

        let mut offset = 0u64;
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            let filled = read_full(&mut reader, &mut chunk)?;
            if filled == 0 {
                break;
            }
            let data = &chunk[..filled];
            let hash = compute_hash(data);
            self.blobs.put_if_absent(&hash, data)?;
            meta.chunks.push(ChunkRef {
                offset,
                size: filled as u64,
                hash,
            });
            offset += filled as u64;
            if filled < self.chunk_size {
                break;
            }
        }
        meta.size = offset;

        let hash = meta.store(self.blobs)?;
        Ok((hash, meta))
    }

    /// Store a renamed copy of a record. Content references are untouched.
    pub fn rename(&self, meta: &Meta, new_name: &str) -> Result<(Hash, Meta), StorageError> {
        let mut renamed = meta.clone();
        renamed.name = new_name.to_string();
        let hash = renamed.store(self.blobs)?;
        Ok((hash, renamed))
    }
}

/// Serves byte ranges of a stored file
pub struct FileReader<'a> {
    blobs: &'a ContentStore,
}

impl<'a> FileReader<'a> {
    pub fn new(blobs: &'a ContentStore) -> Self {
        Self { blobs }
    }

    /// Read up to `len` bytes at `offset`. Past the end yields nothing.
    pub fn read_at(&self, meta: &Meta, offset: u64, len: usize) -> Result<Vec<u8>, StorageError> {
        if offset >= meta.size || len == 0 {
            return Ok(Vec::new());
        }
        let end = meta.size.min(offset.saturating_add(len as u64));
        let mut out = Vec::with_capacity((end - offset) as usize);
        for chunk in &meta.chunks {
            let chunk_end = chunk.offset + chunk.size;
            if chunk_end <= offset || chunk.offset >= end {
                continue;
            }
            let data = self.blobs.get(&chunk.hash)?;
            if data.len() as u64 != chunk.size {
                return Err(StorageError::ProtocolError(format!(
                    "chunk {} has {} bytes, record says {}",
                    hex::encode(chunk.hash),
                    data.len(),
                    chunk.size
                )));
            }
            let from = offset.max(chunk.offset) - chunk.offset;
            let to = end.min(chunk_end) - chunk.offset;
            out.extend_from_slice(&data[from as usize..to as usize]);
        }
        Ok(out)
    }

    pub fn read_all(&self, meta: &Meta) -> Result<Vec<u8>, StorageError> {
        self.read_at(meta, 0, usize::try_from(meta.size).unwrap_or(usize::MAX))
    }
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, StorageError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(StorageError::IoError(e)),
        }
    }
    Ok(filled)
}
