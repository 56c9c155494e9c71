//! Extended attributes
//!
//! Stored attributes live in the node record. Two read-only virtual
//! attributes are computed: `ref` (the node hash) and `url` (public link).
//! Setting `public` applies to the whole subtree.

use super::{FsState, MirrorFs};
use crate::error::FsError;
use crate::tree::meta::PUBLIC_XATTR;
use crate::tree::node::Node;
use crate::types::{hash_to_hex, Inode};
use tracing::{debug, info, instrument};

pub const REF_XATTR: &str = "ref";
pub const URL_XATTR: &str = "url";

fn is_virtual(name: &str) -> bool {
    name == REF_XATTR || name == URL_XATTR
}

/// Public link for a node: `{base}/d/{hash}` or `{base}/f/{hash}`.
pub fn public_url(base: &str, node_is_dir: bool, hash: &str) -> String {
    let kind = if node_is_dir { "d" } else { "f" };
    format!("{}/{}/{}", base.trim_end_matches('/'), kind, hash)
}

impl MirrorFs {
    fn virtual_xattr(&self, node: &Node, name: &str) -> Option<String> {
        match name {
            REF_XATTR => Some(hash_to_hex(&node.hash)),
            URL_XATTR if node.meta.is_public() => self
                .options
                .public_url
                .as_deref()
                .map(|base| public_url(base, node.is_dir(), &hash_to_hex(&node.hash))),
            _ => None,
        }
    }

    pub fn getxattr(&self, inode: Inode, name: &str) -> Result<Vec<u8>, FsError> {
        let state = self.state.lock();
        let node = state.tree.get(inode)?;
        if let Some(value) = self.virtual_xattr(node, name) {
            return Ok(value.into_bytes());
        }
        node.meta
            .xattrs
            .get(name)
            .map(|v| v.as_bytes().to_vec())
            .ok_or_else(|| FsError::NoXattr(name.to_string()))
    }

    pub fn listxattr(&self, inode: Inode) -> Result<Vec<String>, FsError> {
        let state = self.state.lock();
        let node = state.tree.get(inode)?;
        let mut names: Vec<String> = [REF_XATTR, URL_XATTR]
            .into_iter()
            .filter(|name| self.virtual_xattr(node, name).is_some())
            .map(str::to_string)
            .collect();
        names.extend(node.meta.xattrs.keys().cloned());
        Ok(names)
    }

    #[instrument(skip(self, value), fields(fs = %self.options.name))]
    pub fn setxattr(&self, inode: Inode, name: &str, value: &[u8]) -> Result<(), FsError> {
        if is_virtual(name) {
            debug!(xattr = name, "Ignoring write to read-only attribute");
            return Ok(());
        }
        let value = std::str::from_utf8(value)
            .map_err(|_| FsError::InvalidArgument(format!("xattr '{}' value is not UTF-8", name)))?
            .to_string();

        let mut state = self.state.lock();
        self.ensure_mutable(&state, "setxattr")?;
        if name == PUBLIC_XATTR {
            self.set_public_locked(&mut state, inode, value == "1")?;
            drop(state);
            self.trigger_sync();
            return Ok(());
        }
        state
            .tree
            .get_mut(inode)?
            .meta
            .xattrs
            .insert(name.to_string(), value);
        self.save_locked(&mut state, inode)?;
        Ok(())
    }

    #[instrument(skip(self), fields(fs = %self.options.name))]
    pub fn removexattr(&self, inode: Inode, name: &str) -> Result<(), FsError> {
        if is_virtual(name) {
            return Err(FsError::PermissionDenied(format!(
                "'{}' is a read-only attribute",
                name
            )));
        }
        let mut state = self.state.lock();
        self.ensure_mutable(&state, "removexattr")?;
        if !state.tree.get(inode)?.meta.xattrs.contains_key(name) {
            return Err(FsError::NoXattr(name.to_string()));
        }
        if name == PUBLIC_XATTR {
            self.set_public_locked(&mut state, inode, false)?;
            drop(state);
            self.trigger_sync();
            return Ok(());
        }
        state.tree.get_mut(inode)?.meta.xattrs.remove(name);
        self.save_locked(&mut state, inode)?;
        Ok(())
    }

    /// Set or clear `public` on `inode` and everything below it, then save.
    fn set_public_locked(&self, state: &mut FsState, inode: Inode, public: bool) -> Result<(), FsError> {
        let touched = self.mark_public(state, inode, public)?;
        self.save_locked(state, inode)?;
        info!(
            path = %state.tree.path_of(inode)?,
            public,
            nodes = touched,
            "Updated public flag"
        );
        Ok(())
    }

    /// Post-order walk: children are re-hashed before their parent.
    fn mark_public(&self, state: &mut FsState, inode: Inode, public: bool) -> Result<usize, FsError> {
        let mut touched = 0;
        if state.tree.get(inode)?.is_dir() {
            for (_, child) in state.tree.list(inode, &self.blobs)? {
                touched += self.mark_public(state, child, public)?;
            }
        }
        let xattrs = &mut state.tree.get_mut(inode)?.meta.xattrs;
        if public {
            xattrs.insert(PUBLIC_XATTR.to_string(), "1".to_string());
        } else {
            xattrs.remove(PUBLIC_XATTR);
        }
        self.rehash_node(state, inode)?;
        Ok(touched + 1)
    }
}
