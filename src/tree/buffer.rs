//! Whole-file edit buffer
//!
//! Holds a file's content while it has open handles. Content stays in memory
//! until it grows past the spill threshold, then moves to an anonymous
//! temporary file.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

pub enum FileBuffer {
    Memory(Vec<u8>),
    Spilled { file: File, len: u64 },
}

impl FileBuffer {
    pub fn empty() -> Self {
        FileBuffer::Memory(Vec::new())
    }

    /// Buffer initial content, spilling straight away if it is already too large.
    pub fn from_bytes(data: Vec<u8>, spill_threshold: Option<u64>) -> io::Result<Self> {
        let mut buffer = FileBuffer::Memory(data);
        buffer.maybe_spill(spill_threshold)?;
        Ok(buffer)
    }

    pub fn len(&self) -> u64 {
        match self {
            FileBuffer::Memory(data) => data.len() as u64,
            FileBuffer::Spilled { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_spilled(&self) -> bool {
        matches!(self, FileBuffer::Spilled { .. })
    }

    /// Read up to `size` bytes at `offset`. Past the end yields nothing.
    pub fn read_at(&mut self, offset: u64, size: usize) -> io::Result<Vec<u8>> {
        let len = self.len();
        if offset >= len {
            return Ok(Vec::new());
        }
        let end = len.min(offset.saturating_add(size as u64));
        match self {
            FileBuffer::Memory(data) => Ok(data[offset as usize..end as usize].to_vec()),
            FileBuffer::Spilled { file, .. } => {
                let mut out = vec![0u8; (end - offset) as usize];
                file.seek(SeekFrom::Start(offset))?;
                file.read_exact(&mut out)?;
                Ok(out)
            }
        }
    }

    /// Copy `data` in at `offset`, growing the buffer. A gap between the old
    /// end and `offset` reads back as zeros.
    pub fn write_at(
        &mut self,
        offset: u64,
        data: &[u8],
        spill_threshold: Option<u64>,
    ) -> io::Result<()> {
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "write overflows u64"))?;
        if !self.is_spilled() && spill_threshold.map_or(false, |t| end > t) {
            self.spill()?;
        }
        match self {
            FileBuffer::Memory(buf) => {
                let end = usize::try_from(end).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, "write exceeds memory buffer")
                })?;
                if buf.len() < end {
                    buf.resize(end, 0);
                }
                buf[offset as usize..end].copy_from_slice(data);
            }
            FileBuffer::Spilled { file, len } => {
                if offset > *len {
                    file.set_len(offset)?;
                }
                file.seek(SeekFrom::Start(offset))?;
                file.write_all(data)?;
                *len = (*len).max(end);
            }
        }
        Ok(())
    }

    /// Truncate or zero-extend to `size`.
    pub fn set_len(&mut self, size: u64, spill_threshold: Option<u64>) -> io::Result<()> {
        if !self.is_spilled() && spill_threshold.map_or(false, |t| size > t) {
            self.spill()?;
        }
        match self {
            FileBuffer::Memory(buf) => {
                let size = usize::try_from(size).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, "size exceeds memory buffer")
                })?;
                buf.resize(size, 0);
            }
            FileBuffer::Spilled { file, len } => {
                file.set_len(size)?;
                *len = size;
            }
        }
        Ok(())
    }

    /// Reader over the whole content, from the start.
    pub fn reader(&mut self) -> io::Result<Box<dyn Read + '_>> {
        match self {
            FileBuffer::Memory(data) => Ok(Box::new(io::Cursor::new(data.as_slice()))),
            FileBuffer::Spilled { file, len } => {
                file.seek(SeekFrom::Start(0))?;
                Ok(Box::new(file.take(*len)))
            }
        }
    }

    fn maybe_spill(&mut self, spill_threshold: Option<u64>) -> io::Result<()> {
        if !self.is_spilled() && spill_threshold.map_or(false, |t| self.len() > t) {
            self.spill()?;
        }
        Ok(())
    }

    fn spill(&mut self) -> io::Result<()> {
        if let FileBuffer::Memory(data) = self {
            let mut file = tempfile::tempfile()?;
            file.write_all(data)?;
            let len = data.len() as u64;
            tracing::debug!(bytes = len, "Spilled file buffer to disk");
            *self = FileBuffer::Spilled { file, len };
        }
        Ok(())
    }
}
