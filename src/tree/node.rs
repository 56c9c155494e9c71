//! In-memory working tree
//!
//! Nodes live in an inode-keyed arena. Each node keeps a non-owning parent
//! inode for bottom-up save propagation; directories own a name -> inode map
//! that is loaded lazily from their stored record on first access.

use crate::error::FsError;
use crate::store::ContentStore;
use crate::tree::buffer::FileBuffer;
use crate::tree::meta::{Meta, NodeKind, DIR_MODE};
use crate::tree::path;
use crate::types::{Hash, Inode, ROOT_INODE};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Per-file open state
#[derive(Default)]
pub struct FileState {
    pub buffer: Option<FileBuffer>,
    pub open_count: u32,
    pub dirty: bool,
}

pub enum NodeState {
    /// `None` until the children have been decoded from the stored record.
    Dir {
        children: Option<BTreeMap<String, Inode>>,
    },
    File(FileState),
}

pub struct Node {
    /// Hash of `meta` as of the last save. Stale between mutation and save.
    pub hash: Hash,
    pub meta: Meta,
    pub parent: Option<Inode>,
    pub state: NodeState,
}

impl Node {
    fn from_meta(hash: Hash, meta: Meta, parent: Option<Inode>) -> Self {
        let state = match meta.kind {
            NodeKind::Dir => NodeState::Dir {
                children: if meta.children.is_empty() {
                    Some(BTreeMap::new())
                } else {
                    None
                },
            },
            NodeKind::File => NodeState::File(FileState::default()),
        };
        Self {
            hash,
            meta,
            parent,
            state,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.state, NodeState::Dir { .. })
    }

    pub fn file(&self) -> Option<&FileState> {
        match &self.state {
            NodeState::File(state) => Some(state),
            NodeState::Dir { .. } => None,
        }
    }

    pub fn file_mut(&mut self) -> Option<&mut FileState> {
        match &mut self.state {
            NodeState::File(state) => Some(state),
            NodeState::Dir { .. } => None,
        }
    }

    /// Loaded children of a directory.
    pub fn children(&self) -> Option<&BTreeMap<String, Inode>> {
        match &self.state {
            NodeState::Dir { children } => children.as_ref(),
            NodeState::File(_) => None,
        }
    }

    /// Current size: the open buffer wins over the stored record.
    pub fn size(&self) -> u64 {
        match self.file().and_then(|f| f.buffer.as_ref()) {
            Some(buffer) => buffer.len(),
            None => self.meta.size,
        }
    }
}

pub struct Tree {
    nodes: HashMap<Inode, Node>,
    next_inode: Inode,
}

impl Tree {
    /// Tree rooted at an already known record.
    pub fn new(root_hash: Hash, mut root_meta: Meta, next_inode: Inode) -> Self {
        root_meta.name.clear();
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_INODE, Node::from_meta(root_hash, root_meta, None));
        Self {
            nodes,
            next_inode: next_inode.max(ROOT_INODE + 1),
        }
    }

    /// Fresh tree with an empty, not yet saved root directory.
    pub fn empty(next_inode: Inode) -> Self {
        Self::new([0u8; 32], Meta::new_dir("", DIR_MODE), next_inode)
    }

    /// Tree for the root record stored under `root_hash`.
    pub fn load(blobs: &ContentStore, root_hash: &Hash, next_inode: Inode) -> Result<Self, FsError> {
        let meta = Meta::load(blobs, root_hash)?;
        if !meta.is_dir() {
            return Err(FsError::NotADirectory(format!(
                "root record {} is not a directory",
                hex::encode(root_hash)
            )));
        }
        Ok(Self::new(*root_hash, meta, next_inode))
    }

    /// First inode number this tree has not handed out.
    pub fn next_inode(&self) -> Inode {
        self.next_inode
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> &Node {
        // The root is inserted at construction and never detached.
        &self.nodes[&ROOT_INODE]
    }

    pub fn root_hash(&self) -> Hash {
        self.root().hash
    }

    pub fn contains(&self, inode: Inode) -> bool {
        self.nodes.contains_key(&inode)
    }

    pub fn get(&self, inode: Inode) -> Result<&Node, FsError> {
        self.nodes
            .get(&inode)
            .ok_or_else(|| FsError::NotFound(format!("inode {}", inode)))
    }

    pub fn get_mut(&mut self, inode: Inode) -> Result<&mut Node, FsError> {
        self.nodes
            .get_mut(&inode)
            .ok_or_else(|| FsError::NotFound(format!("inode {}", inode)))
    }

    fn alloc(&mut self) -> Inode {
        let inode = self.next_inode;
        self.next_inode += 1;
        inode
    }

    /// Decode a directory's children from its record if not done yet.
    pub fn ensure_loaded(&mut self, inode: Inode, blobs: &ContentStore) -> Result<(), FsError> {
        let node = self.get(inode)?;
        let child_hashes = match &node.state {
            NodeState::Dir { children: Some(_) } => return Ok(()),
            NodeState::Dir { children: None } => node.meta.children.clone(),
            NodeState::File(_) => {
                return Err(FsError::NotADirectory(node.meta.name.clone()));
            }
        };

        let mut children = BTreeMap::new();
        for hash in child_hashes {
            let meta = Meta::load(blobs, &hash)?;
            let child = self.alloc();
            if let Some(previous) = children.insert(meta.name.clone(), child) {
                warn!(name = %meta.name, "Duplicate child name in stored record");
                self.nodes.remove(&previous);
            }
            self.nodes
                .insert(child, Node::from_meta(hash, meta, Some(inode)));
        }
        if let NodeState::Dir { children: slot } = &mut self.get_mut(inode)?.state {
            *slot = Some(children);
        }
        Ok(())
    }

    /// Loaded `(name, inode)` pairs of a directory, in name order.
    pub fn list(&mut self, inode: Inode, blobs: &ContentStore) -> Result<Vec<(String, Inode)>, FsError> {
        self.ensure_loaded(inode, blobs)?;
        Ok(self
            .get(inode)?
            .children()
            .map(|c| c.iter().map(|(n, i)| (n.clone(), *i)).collect())
            .unwrap_or_default())
    }

    pub fn lookup(
        &mut self,
        parent: Inode,
        name: &str,
        blobs: &ContentStore,
    ) -> Result<Option<Inode>, FsError> {
        self.ensure_loaded(parent, blobs)?;
        Ok(self
            .get(parent)?
            .children()
            .and_then(|c| c.get(name).copied()))
    }

    /// Insert a node for `meta` under `parent`, replacing any same-named child.
    pub fn attach(
        &mut self,
        parent: Inode,
        hash: Hash,
        meta: Meta,
        blobs: &ContentStore,
    ) -> Result<Inode, FsError> {
        self.ensure_loaded(parent, blobs)?;
        let name = meta.name.clone();
        self.detach(parent, &name)?;
        let inode = self.alloc();
        self.nodes
            .insert(inode, Node::from_meta(hash, meta, Some(parent)));
        self.children_mut(parent)?.insert(name, inode);
        Ok(inode)
    }

    /// Remove a child and drop its whole subtree from the arena.
    pub fn detach(&mut self, parent: Inode, name: &str) -> Result<Option<Inode>, FsError> {
        let Some(inode) = self.children_mut(parent)?.remove(name) else {
            return Ok(None);
        };
        let mut stack = vec![inode];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                if let Some(children) = node.children() {
                    stack.extend(children.values().copied());
                }
            }
        }
        Ok(Some(inode))
    }

    /// Move `parent/name` to `new_parent/new_name`, replacing any existing target.
    pub fn relocate(
        &mut self,
        parent: Inode,
        name: &str,
        new_parent: Inode,
        new_name: &str,
    ) -> Result<Inode, FsError> {
        let inode = self
            .children_mut(parent)?
            .remove(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        self.detach(new_parent, new_name)?;
        self.children_mut(new_parent)?
            .insert(new_name.to_string(), inode);
        let node = self.get_mut(inode)?;
        node.parent = Some(new_parent);
        node.meta.name = new_name.to_string();
        Ok(inode)
    }

    fn children_mut(&mut self, inode: Inode) -> Result<&mut BTreeMap<String, Inode>, FsError> {
        let node = self.get_mut(inode)?;
        let name = node.meta.name.clone();
        match &mut node.state {
            NodeState::Dir {
                children: Some(children),
            } => Ok(children),
            NodeState::Dir { children: None } => Err(FsError::InvalidArgument(format!(
                "directory '{}' is not loaded",
                name
            ))),
            NodeState::File(_) => Err(FsError::NotADirectory(name)),
        }
    }

    /// Resolve an absolute tree path, loading directories along the way.
    pub fn resolve(&mut self, tree_path: &str, blobs: &ContentStore) -> Result<Option<Inode>, FsError> {
        let mut current = ROOT_INODE;
        for component in path::split_path(tree_path)? {
            if !self.get(current)?.is_dir() {
                return Ok(None);
            }
            match self.lookup(current, &component, blobs)? {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Absolute path of a node.
    pub fn path_of(&self, inode: Inode) -> Result<String, FsError> {
        let mut names = Vec::new();
        let mut current = self.get(inode)?;
        while let Some(parent) = current.parent {
            names.push(current.meta.name.clone());
            current = self.get(parent)?;
        }
        names.reverse();
        Ok(format!("/{}", names.join("/")))
    }

    /// True if `ancestor` is `inode` or lies on its parent chain.
    pub fn is_same_or_ancestor(&self, ancestor: Inode, inode: Inode) -> bool {
        let mut current = Some(inode);
        while let Some(i) = current {
            if i == ancestor {
                return true;
            }
            current = self.nodes.get(&i).and_then(|n| n.parent);
        }
        false
    }

    /// Hashes a directory record should reference: live children when loaded,
    /// otherwise the stored references.
    pub fn child_hashes(&self, inode: Inode) -> Result<Vec<Hash>, FsError> {
        let node = self.get(inode)?;
        match node.children() {
            Some(children) => children
                .values()
                .map(|child| self.get(*child).map(|c| c.hash))
                .collect(),
            None => Ok(node.meta.children.clone()),
        }
    }

    /// Inodes of open files.
    pub fn open_files(&self) -> Vec<Inode> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.file().map_or(false, |f| f.open_count > 0))
            .map(|(i, _)| *i)
            .collect()
    }
}
