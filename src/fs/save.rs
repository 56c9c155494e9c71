//! Save propagation
//!
//! A change to one node re-encodes that node and every ancestor up to the
//! root, storing each new record. The new root hash is committed to the WIP
//! track unless it equals the active mount's root.

use super::{FsState, MirrorFs};
use crate::error::FsError;
use crate::heads::Root;
use crate::mount::Mount;
use crate::store::Precondition;
use crate::types::{short_hex, Hash, Inode};
use tracing::{debug, info};

impl MirrorFs {
    /// Re-hash `inode` and its ancestors, then commit the root.
    pub(crate) fn save_locked(&self, state: &mut FsState, inode: Inode) -> Result<Hash, FsError> {
        let hash = self.propagate_locked(state, inode)?;
        self.commit_root(state, hash)?;
        Ok(hash)
    }

    /// Re-hash `inode` and its ancestors without committing. Returns the new
    /// root hash.
    pub(crate) fn propagate_locked(&self, state: &mut FsState, inode: Inode) -> Result<Hash, FsError> {
        let mut current = inode;
        loop {
            let hash = self.rehash_node(state, current)?;
            match state.tree.get(current)?.parent {
                Some(parent) => current = parent,
                None => return Ok(hash),
            }
        }
    }

    /// Re-encode and store one node's record. Directories pick up their
    /// children's current hashes.
    pub(crate) fn rehash_node(&self, state: &mut FsState, inode: Inode) -> Result<Hash, FsError> {
        let children = if state.tree.get(inode)?.is_dir() {
            Some(state.tree.child_hashes(inode)?)
        } else {
            None
        };
        let node = state.tree.get_mut(inode)?;
        if let Some(children) = children {
            node.meta.children = children;
        }
        let (hash, bytes) = node.meta.encode()?;
        self.blobs.put_if_absent(&hash, &bytes)?;
        node.hash = hash;
        Ok(hash)
    }

    /// Append a new WIP version for `hash` and make it the local mount,
    /// unless `hash` already is the active root.
    pub(crate) fn commit_root(&self, state: &mut FsState, hash: Hash) -> Result<(), FsError> {
        if state.active().map_or(false, |m| m.root.root_ref == hash) {
            debug!(root = %short_hex(&hash), "Root unchanged; nothing to commit");
            return Ok(());
        }
        self.append_root(state, hash)
    }

    /// Commit `hash` as a new WIP version even if the active root already
    /// matches it, numbered past everything seen so far.
    pub(crate) fn append_root(&self, state: &mut FsState, hash: Hash) -> Result<(), FsError> {
        let floor = [
            self.wip.latest_version()?,
            self.mirror.latest_version()?,
            state.remote.as_ref().map(Mount::version),
        ]
        .into_iter()
        .flatten()
        .max();
        let version = floor.map_or(1, |v| v + 1);

        let mut root = Root::new(hash);
        root.host = self.options.hostname.clone();
        let committed = self.wip.commit(&root, Some(version), Precondition::Any)?;
        info!(
            fs = %self.options.name,
            version = committed.version,
            root = %short_hex(&hash),
            "Committed WIP root"
        );
        state.local = Some(Mount::local(committed));
        state.stats.versions_committed += 1;
        Ok(())
    }
}
