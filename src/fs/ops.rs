//! Node operations
//!
//! Inode-addressed entry points a kernel adapter calls, plus path-addressed
//! helpers built on them. Every operation holds the tree lock throughout.

use super::{FsState, MirrorFs};
use crate::error::{FsError, StorageError};
use crate::tree::buffer::FileBuffer;
use crate::tree::chunker::{FileReader, FileWriter};
use crate::tree::meta::{Meta, NodeKind, DIR_MODE, FILE_MODE, PUBLIC_XATTR};
use crate::tree::node::Node;
use crate::tree::path;
use crate::types::{Hash, Inode, ROOT_INODE};
use serde::Serialize;
use tracing::{debug, instrument};

/// Attributes reported for a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attr {
    pub inode: Inode,
    pub kind: NodeKind,
    pub name: String,
    pub mode: u32,
    pub size: u64,
    pub mtime: String,
    #[serde(with = "crate::types::hex_hash")]
    pub hash: Hash,
}

impl Attr {
    fn of(inode: Inode, node: &Node) -> Self {
        Self {
            inode,
            kind: node.meta.kind,
            name: node.meta.name.clone(),
            mode: node.meta.mode,
            size: node.size(),
            mtime: node.meta.mtime.clone(),
            hash: node.hash,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Dir
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub inode: Inode,
    pub name: String,
    pub kind: NodeKind,
}

/// Attribute changes; `None` fields are left alone
#[derive(Debug, Clone, Default)]
pub struct SetAttr {
    pub mode: Option<u32>,
    pub size: Option<u64>,
    pub mtime: Option<String>,
}

impl MirrorFs {
    pub fn lookup(&self, parent: Inode, name: &str) -> Result<Attr, FsError> {
        let name = path::normalize_name(name)?;
        let mut state = self.state.lock();
        let inode = state
            .tree
            .lookup(parent, &name, &self.blobs)?
            .ok_or_else(|| FsError::NotFound(name.clone()))?;
        state.cached.insert(inode);
        Ok(Attr::of(inode, state.tree.get(inode)?))
    }

    pub fn getattr(&self, inode: Inode) -> Result<Attr, FsError> {
        let state = self.state.lock();
        Ok(Attr::of(inode, state.tree.get(inode)?))
    }

    pub fn readdir(&self, inode: Inode) -> Result<Vec<DirEntry>, FsError> {
        let mut state = self.state.lock();
        let listed = state.tree.list(inode, &self.blobs)?;
        state.cached.insert(inode);
        listed
            .into_iter()
            .map(|(name, child)| {
                Ok(DirEntry {
                    inode: child,
                    name,
                    kind: state.tree.get(child)?.meta.kind,
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(fs = %self.options.name))]
    pub fn mkdir(&self, parent: Inode, name: &str, mode: Option<u32>) -> Result<Attr, FsError> {
        let mut state = self.state.lock();
        self.ensure_mutable(&state, "mkdir")?;
        let meta = Meta::new_dir(&path::normalize_name(name)?, mode.unwrap_or(DIR_MODE));
        let inode = self.create_node(&mut state, parent, meta)?;
        state.stats.dirs_created += 1;
        Ok(Attr::of(inode, state.tree.get(inode)?))
    }

    /// Create an empty file and open it once.
    #[instrument(skip(self), fields(fs = %self.options.name))]
    pub fn create(&self, parent: Inode, name: &str, mode: Option<u32>) -> Result<Attr, FsError> {
        let mut state = self.state.lock();
        self.ensure_mutable(&state, "create")?;
        let meta = Meta::new_file(&path::normalize_name(name)?, mode.unwrap_or(FILE_MODE));
        let inode = self.create_node(&mut state, parent, meta)?;
        if let Some(file) = state.tree.get_mut(inode)?.file_mut() {
            file.open_count = 1;
            file.buffer = Some(FileBuffer::empty());
        }
        state.stats.files_created += 1;
        Ok(Attr::of(inode, state.tree.get(inode)?))
    }

    /// Attach a new node under `parent` and save it.
    fn create_node(&self, state: &mut FsState, parent: Inode, mut meta: Meta) -> Result<Inode, FsError> {
        let parent_node = state.tree.get(parent)?;
        if !parent_node.is_dir() {
            return Err(FsError::NotADirectory(parent_node.meta.name.clone()));
        }
        if parent_node.meta.is_public() {
            meta.xattrs
                .insert(PUBLIC_XATTR.to_string(), "1".to_string());
        }
        if state.tree.lookup(parent, &meta.name, &self.blobs)?.is_some() {
            return Err(FsError::Exists(meta.name));
        }
        let inode = state.tree.attach(parent, [0u8; 32], meta, &self.blobs)?;
        self.save_locked(state, inode)?;
        state.cached.insert(inode);
        Ok(inode)
    }

    /// Remove a file or an empty directory.
    #[instrument(skip(self), fields(fs = %self.options.name))]
    pub fn remove(&self, parent: Inode, name: &str) -> Result<(), FsError> {
        let name = path::normalize_name(name)?;
        let mut state = self.state.lock();
        self.ensure_mutable(&state, "remove")?;
        let inode = state
            .tree
            .lookup(parent, &name, &self.blobs)?
            .ok_or_else(|| FsError::NotFound(name.clone()))?;
        if state.tree.get(inode)?.is_dir() && !state.tree.list(inode, &self.blobs)?.is_empty() {
            return Err(FsError::DirectoryNotEmpty(name));
        }
        state.tree.detach(parent, &name)?;
        state.cached.remove(&inode);
        self.save_locked(&mut state, parent)?;
        state.stats.dirs_updated += 1;
        debug!(name = %name, "Removed entry");
        Ok(())
    }

    /// Move `parent/name` to `new_parent/new_name`, replacing a file or empty
    /// directory already there.
    #[instrument(skip(self), fields(fs = %self.options.name))]
    pub fn rename(
        &self,
        parent: Inode,
        name: &str,
        new_parent: Inode,
        new_name: &str,
    ) -> Result<(), FsError> {
        let name = path::normalize_name(name)?;
        let new_name = path::normalize_name(new_name)?;
        let mut state = self.state.lock();
        self.ensure_mutable(&state, "rename")?;

        let inode = state
            .tree
            .lookup(parent, &name, &self.blobs)?
            .ok_or_else(|| FsError::NotFound(name.clone()))?;
        state.tree.ensure_loaded(new_parent, &self.blobs)?;
        if state.tree.is_same_or_ancestor(inode, new_parent) {
            return Err(FsError::InvalidArgument(format!(
                "cannot move '{}' into itself",
                name
            )));
        }
        if let Some(target) = state.tree.lookup(new_parent, &new_name, &self.blobs)? {
            if target == inode {
                return Ok(());
            }
            if state.tree.get(target)?.is_dir() && !state.tree.list(target, &self.blobs)?.is_empty() {
                return Err(FsError::DirectoryNotEmpty(new_name));
            }
            state.cached.remove(&target);
        }

        state.tree.relocate(parent, &name, new_parent, &new_name)?;
        let node = state.tree.get(inode)?;
        if !node.is_dir() {
            let (hash, meta) =
                FileWriter::new(&self.blobs, self.options.chunk_size).rename(&node.meta, &new_name)?;
            let node = state.tree.get_mut(inode)?;
            node.hash = hash;
            node.meta = meta;
        }
        self.save_locked(&mut state, inode)?;
        if parent != new_parent {
            self.save_locked(&mut state, parent)?;
        }
        state.stats.dirs_updated += 1;
        Ok(())
    }

    /// Change mode, mtime or size.
    #[instrument(skip(self), fields(fs = %self.options.name))]
    pub fn setattr(&self, inode: Inode, changes: SetAttr) -> Result<Attr, FsError> {
        let mut state = self.state.lock();
        self.ensure_mutable(&state, "setattr")?;

        if let Some(size) = changes.size {
            self.truncate_locked(&mut state, inode, size)?;
        }
        let node = state.tree.get_mut(inode)?;
        if let Some(mode) = changes.mode {
            node.meta.mode = mode;
        }
        if let Some(mtime) = changes.mtime {
            node.meta.mtime = mtime;
        }
        self.save_locked(&mut state, inode)?;
        Ok(Attr::of(inode, state.tree.get(inode)?))
    }

    fn truncate_locked(&self, state: &mut FsState, inode: Inode, size: u64) -> Result<(), FsError> {
        if size > self.options.max_file_size {
            return Err(FsError::FileTooLarge { offset: 0, len: size });
        }
        let spill = self.options.spill_threshold;
        let node = state.tree.get_mut(inode)?;
        let name = node.meta.name.clone();
        let stored = node.meta.clone();
        let file = node
            .file_mut()
            .ok_or_else(|| FsError::IsADirectory(name))?;

        if let Some(buffer) = file.buffer.as_mut() {
            buffer.set_len(size, spill).map_err(StorageError::IoError)?;
            file.dirty = true;
            return Ok(());
        }

        // Not open: rewrite the stored content directly.
        let mut data = FileReader::new(&self.blobs).read_all(&stored)?;
        let len = usize::try_from(size).map_err(|_| FsError::FileTooLarge { offset: 0, len: size })?;
        data.resize(len, 0);
        let (hash, meta) =
            FileWriter::new(&self.blobs, self.options.chunk_size).write(&stored, data.as_slice())?;
        let node = state.tree.get_mut(inode)?;
        node.hash = hash;
        node.meta = meta;
        state.stats.files_updated += 1;
        Ok(())
    }

    /// Resolve an absolute tree path to an inode.
    pub fn resolve_path(&self, tree_path: &str) -> Result<Option<Inode>, FsError> {
        let mut state = self.state.lock();
        let inode = state.tree.resolve(tree_path, &self.blobs)?;
        Ok(inode)
    }

    /// Create every missing directory along `tree_path`.
    pub fn mkdir_all(&self, tree_path: &str) -> Result<Inode, FsError> {
        let mut current = ROOT_INODE;
        for component in path::split_path(tree_path)? {
            current = match self.lookup(current, &component) {
                Ok(attr) if attr.is_dir() => attr.inode,
                Ok(_) => return Err(FsError::NotADirectory(component)),
                Err(FsError::NotFound(_)) => self.mkdir(current, &component, None)?.inode,
                Err(e) => return Err(e),
            };
        }
        Ok(current)
    }

    /// Replace the content of the file at `tree_path`, creating it and its
    /// parent directories as needed.
    pub fn write_path(&self, tree_path: &str, data: &[u8]) -> Result<Attr, FsError> {
        let (parent_path, name) = path::parent_and_name(tree_path)?;
        let parent = self.mkdir_all(&parent_path)?;
        let inode = match self.lookup(parent, &name) {
            Ok(attr) if attr.is_dir() => return Err(FsError::IsADirectory(tree_path.to_string())),
            Ok(attr) => {
                self.open(attr.inode)?;
                attr.inode
            }
            Err(FsError::NotFound(_)) => self.create(parent, &name, None)?.inode,
            Err(e) => return Err(e),
        };

        let written = self
            .setattr(
                inode,
                SetAttr {
                    size: Some(0),
                    ..SetAttr::default()
                },
            )
            .and_then(|_| self.write(inode, 0, data));
        let released = self.release(inode);
        written?;
        released?;
        self.getattr(inode)
    }

    /// Whole content of the file at `tree_path`.
    pub fn read_path(&self, tree_path: &str) -> Result<Vec<u8>, FsError> {
        let inode = self
            .resolve_path(tree_path)?
            .ok_or_else(|| FsError::NotFound(tree_path.to_string()))?;
        let attr = self.getattr(inode)?;
        if attr.is_dir() {
            return Err(FsError::IsADirectory(tree_path.to_string()));
        }
        let size = usize::try_from(attr.size).map_err(|_| FsError::FileTooLarge {
            offset: 0,
            len: attr.size,
        })?;
        self.read(inode, 0, size)
    }

    /// Absolute path of an inode in the working tree.
    pub fn path_of(&self, inode: Inode) -> Result<String, FsError> {
        self.state.lock().tree.path_of(inode)
    }
}
