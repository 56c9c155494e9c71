//! Tree indexing and comparison
//!
//! Trees are compared through flat path indexes built straight from stored
//! records, so no working-tree lock is needed to build them.

use crate::error::FsError;
use crate::store::ContentStore;
use crate::tree::meta::{Meta, NodeKind};
use crate::tree::path;
use crate::types::Hash;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    #[serde(with = "crate::types::hex_hash")]
    pub hash: Hash,
    pub kind: NodeKind,
}

/// Absolute path -> entry for every node below a root. The root itself is
/// not listed.
pub type PathIndex = BTreeMap<String, IndexEntry>;

/// Visit every record reachable from `root`, parents before children.
pub fn walk_tree<F>(blobs: &ContentStore, root: &Hash, mut visit: F) -> Result<(), FsError>
where
    F: FnMut(&str, &Hash, &Meta) -> Result<(), FsError>,
{
    // (parent path, hash); the root has no parent
    let mut stack: Vec<(Option<String>, Hash)> = vec![(None, *root)];
    while let Some((parent, hash)) = stack.pop() {
        let meta = Meta::load(blobs, &hash)?;
        let node_path = match parent {
            Some(parent) => path::join(&parent, &meta.name),
            None => "/".to_string(),
        };
        visit(&node_path, &hash, &meta)?;
        if meta.is_dir() {
            for child in &meta.children {
                stack.push((Some(node_path.clone()), *child));
            }
        }
    }
    Ok(())
}

pub fn index_tree(blobs: &ContentStore, root: &Hash) -> Result<PathIndex, FsError> {
    let mut index = PathIndex::new();
    walk_tree(blobs, root, |node_path, hash, meta| {
        if node_path != "/" {
            index.insert(
                node_path.to_string(),
                IndexEntry {
                    hash: *hash,
                    kind: meta.kind,
                },
            );
        }
        Ok(())
    })?;
    Ok(index)
}

/// Every blob a root depends on: records and chunks, each once, with
/// children ahead of the records that reference them.
pub fn collect_refs(blobs: &ContentStore, root: &Hash) -> Result<Vec<Hash>, FsError> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    let mut stack = vec![(*root, false)];
    while let Some((hash, expanded)) = stack.pop() {
        if expanded {
            ordered.push(hash);
            continue;
        }
        if !seen.insert(hash) {
            continue;
        }
        let meta = Meta::load(blobs, &hash)?;
        stack.push((hash, true));
        for chunk in &meta.chunks {
            if seen.insert(chunk.hash) {
                ordered.push(chunk.hash);
            }
        }
        for child in &meta.children {
            if !seen.contains(child) {
                stack.push((*child, false));
            }
        }
    }
    Ok(ordered)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    pub path: String,
    #[serde(with = "crate::types::hex_hash")]
    pub hash: Hash,
    pub kind: NodeKind,
}

impl DiffEntry {
    fn new(path: &str, entry: &IndexEntry) -> Self {
        Self {
            path: path.to_string(),
            hash: entry.hash,
            kind: entry.kind,
        }
    }
}

/// A path present on both sides with different content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub path: String,
    pub local: IndexEntry,
    pub remote: IndexEntry,
}

impl Conflict {
    pub fn both_dirs(&self) -> bool {
        self.local.kind == NodeKind::Dir && self.remote.kind == NodeKind::Dir
    }
}

/// Result of comparing a local index against a remote one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diff {
    /// Only on the remote side, shallowest first.
    pub added: Vec<DiffEntry>,
    pub conflicted: Vec<Conflict>,
    /// Only on the local side, deepest first. Never applied automatically.
    pub deleted_candidates: Vec<DiffEntry>,
}

impl Diff {
    pub fn compute(local: &PathIndex, remote: &PathIndex) -> Self {
        let mut diff = Diff::default();
        for (p, remote_entry) in remote {
            match local.get(p) {
                None => diff.added.push(DiffEntry::new(p, remote_entry)),
                Some(local_entry) if local_entry.hash != remote_entry.hash => {
                    diff.conflicted.push(Conflict {
                        path: p.clone(),
                        local: *local_entry,
                        remote: *remote_entry,
                    })
                }
                Some(_) => {}
            }
        }
        for (p, local_entry) in local {
            if !remote.contains_key(p) {
                diff.deleted_candidates.push(DiffEntry::new(p, local_entry));
            }
        }

        diff.added
            .sort_by(|a, b| path::depth(&a.path).cmp(&path::depth(&b.path)).then_with(|| a.path.cmp(&b.path)));
        diff.deleted_candidates
            .sort_by(|a, b| path::depth(&b.path).cmp(&path::depth(&a.path)).then_with(|| a.path.cmp(&b.path)));
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.conflicted.is_empty() && self.deleted_candidates.is_empty()
    }

    /// True when everything local is also on the remote unchanged.
    pub fn local_is_subset(&self) -> bool {
        self.conflicted.is_empty() && self.deleted_candidates.is_empty()
    }
}
