//! Open-file lifecycle
//!
//! The first open of a file under a mutable mount loads its whole content
//! into a buffer. Writes go to the buffer; the last release chunks the buffer
//! back into the store and saves.

use super::{FsState, MirrorFs};
use crate::error::{FsError, StorageError};
use crate::tree::buffer::FileBuffer;
use crate::tree::chunker::{FileReader, FileWriter};
use crate::types::{short_hex, Inode};
use tracing::{debug, instrument};

impl MirrorFs {
    #[instrument(skip(self), fields(fs = %self.options.name))]
    pub fn open(&self, inode: Inode) -> Result<(), FsError> {
        let mut state = self.state.lock();
        let immutable = state.immutable();
        let spill = self.options.spill_threshold;

        let node = state.tree.get_mut(inode)?;
        let meta = node.meta.clone();
        let file = node
            .file_mut()
            .ok_or_else(|| FsError::IsADirectory(meta.name.clone()))?;
        file.open_count += 1;
        if file.open_count == 1 && !immutable {
            let buffer = if meta.size == 0 {
                FileBuffer::empty()
            } else {
                let data = FileReader::new(&self.blobs).read_all(&meta)?;
                FileBuffer::from_bytes(data, spill).map_err(StorageError::IoError)?
            };
            file.buffer = Some(buffer);
            file.dirty = false;
            debug!(file = %meta.name, size = meta.size, "Loaded file buffer");
        }
        state.cached.insert(inode);
        Ok(())
    }

    /// Read up to `size` bytes at `offset`.
    pub fn read(&self, inode: Inode, offset: u64, size: usize) -> Result<Vec<u8>, FsError> {
        let mut state = self.state.lock();
        let node = state.tree.get_mut(inode)?;
        if node.is_dir() {
            return Err(FsError::IsADirectory(node.meta.name.clone()));
        }
        if let Some(buffer) = node.file_mut().and_then(|f| f.buffer.as_mut()) {
            return Ok(buffer.read_at(offset, size).map_err(StorageError::IoError)?);
        }
        let meta = node.meta.clone();
        Ok(FileReader::new(&self.blobs).read_at(&meta, offset, size)?)
    }

    /// Write into the open buffer. Returns the number of bytes taken.
    pub fn write(&self, inode: Inode, offset: u64, data: &[u8]) -> Result<usize, FsError> {
        let mut state = self.state.lock();
        self.ensure_mutable(&state, "write")?;

        let len = data.len() as u64;
        let fits = offset
            .checked_add(len)
            .map_or(false, |end| end <= self.options.max_file_size);
        if !fits {
            return Err(FsError::FileTooLarge { offset, len });
        }

        let spill = self.options.spill_threshold;
        let node = state.tree.get_mut(inode)?;
        let name = node.meta.name.clone();
        let file = node
            .file_mut()
            .ok_or_else(|| FsError::IsADirectory(name))?;
        let buffer = file.buffer.as_mut().ok_or(FsError::NotOpen(inode))?;
        buffer
            .write_at(offset, data, spill)
            .map_err(StorageError::IoError)?;
        file.dirty = true;
        Ok(data.len())
    }

    /// Drop one open handle. The last one flushes a dirty buffer and saves.
    #[instrument(skip(self), fields(fs = %self.options.name))]
    pub fn release(&self, inode: Inode) -> Result<(), FsError> {
        let mut state = self.state.lock();
        let immutable = state.immutable();

        let Ok(node) = state.tree.get_mut(inode) else {
            debug!("Released inode no longer in the tree");
            return Ok(());
        };
        let stored_size = node.meta.size;
        let Some(file) = node.file_mut() else {
            return Ok(());
        };
        if file.open_count == 0 {
            return Ok(());
        }
        file.open_count -= 1;
        if file.open_count > 0 {
            return Ok(());
        }

        let has_content = file.buffer.as_ref().map_or(false, |b| !b.is_empty());
        let should_flush = file.dirty && !immutable && (has_content || stored_size > 0);
        if should_flush {
            if let Err(e) = self.flush_buffer(&mut state, inode) {
                // Keep the handle and the dirty buffer so the release can be retried.
                if let Some(file) = state.tree.get_mut(inode).ok().and_then(|n| n.file_mut()) {
                    file.open_count += 1;
                }
                return Err(e);
            }
        }

        if let Some(file) = state.tree.get_mut(inode).ok().and_then(|n| n.file_mut()) {
            file.buffer = None;
            file.dirty = false;
        }
        Ok(())
    }

    /// Accepted for the kernel's sake; content is only persisted on release.
    pub fn flush(&self, inode: Inode) -> Result<(), FsError> {
        self.state.lock().tree.get(inode)?;
        Ok(())
    }

    pub fn fsync(&self, inode: Inode) -> Result<(), FsError> {
        self.flush(inode)
    }

    /// Persist every dirty open buffer. The buffers stay loaded, so further
    /// writes and the final release work as before. Returns how many flushed.
    pub(crate) fn flush_open_locked(&self, state: &mut FsState) -> Result<usize, FsError> {
        if state.immutable() {
            return Ok(0);
        }
        let mut flushed = 0;
        for inode in state.tree.open_files() {
            if !state.tree.get(inode)?.file().map_or(false, |f| f.dirty) {
                continue;
            }
            self.flush_buffer(state, inode)?;
            if let Some(file) = state.tree.get_mut(inode)?.file_mut() {
                file.dirty = false;
            }
            flushed += 1;
        }
        Ok(flushed)
    }

    /// Chunk the buffer into the store and save from the file upward.
    fn flush_buffer(&self, state: &mut FsState, inode: Inode) -> Result<(), FsError> {
        let writer = FileWriter::new(&self.blobs, self.options.chunk_size);
        let node = state.tree.get_mut(inode)?;
        let template = node.meta.clone();
        let buffer = node
            .file_mut()
            .and_then(|f| f.buffer.as_mut())
            .ok_or(FsError::NotOpen(inode))?;
        let reader = buffer.reader().map_err(StorageError::IoError)?;
        let (hash, meta) = writer.write(&template, reader)?;

        let node = state.tree.get_mut(inode)?;
        node.hash = hash;
        node.meta = meta;
        self.save_locked(state, inode)?;
        state.stats.files_updated += 1;
        debug!(file = %template.name, hash = %short_hex(&hash), "Flushed file buffer");
        Ok(())
    }
}
