//! Pull: bring the working tree up to the latest remote root
//!
//! Remote history is read and indexed under the sync gate only. The tree lock
//! is held for the apply phase: either a fast-forward that swaps in the remote
//! tree, or a merge that materializes remote entries into the local tree.

use super::diff::{self, Diff};
use crate::error::FsError;
use crate::fs::{FsState, MirrorFs};
use crate::heads::Root;
use crate::mount::Mount;
use crate::tree::chunker::FileWriter;
use crate::tree::meta::{Meta, NodeKind, DIR_MODE};
use crate::tree::path::{self, CONFLICT_SUFFIX};
use crate::tree::Tree;
use crate::types::{short_hex, Hash, Inode, Version, ROOT_INODE};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PullOutcome {
    NoRemote,
    AlreadyInSync {
        version: Version,
    },
    FastForward {
        from: Option<Version>,
        to: Version,
    },
    Merged {
        remote_version: Version,
        local_version: Option<Version>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullReport {
    #[serde(flatten)]
    pub outcome: PullOutcome,
    pub versions_mirrored: usize,
    /// Set when local had diverged and a merge ran.
    pub diff: Option<Diff>,
    /// Paths the remote side of conflicts was materialized at.
    pub conflicted_copies: Vec<String>,
    /// Directories whose own attributes differ on the remote. The local
    /// attributes were kept.
    pub attribute_conflicts: Vec<String>,
}

impl PullReport {
    fn new(outcome: PullOutcome) -> Self {
        Self {
            outcome,
            versions_mirrored: 0,
            diff: None,
            conflicted_copies: Vec::new(),
            attribute_conflicts: Vec::new(),
        }
    }
}

impl MirrorFs {
    #[instrument(skip(self), fields(fs = %self.options.name))]
    pub fn pull(&self) -> Result<PullReport, FsError> {
        let _op = self.in_flight.begin();
        let _gate = self.sync_gate.lock();
        let start = Instant::now();

        let mirror = self.mirror.latest()?;
        let remote = match (mirror.as_ref(), self.remote.latest()?) {
            (None, None) => {
                debug!("No remote root published yet");
                return Ok(PullReport::new(PullOutcome::NoRemote));
            }
            (Some(m), None) => {
                return Err(FsError::OutOfSync {
                    mirror: m.version,
                    remote: None,
                })
            }
            (Some(m), Some(r)) if r.version < m.version => {
                return Err(FsError::OutOfSync {
                    mirror: m.version,
                    remote: Some(r.version),
                })
            }
            (Some(m), Some(r)) if r.version == m.version => {
                if r.root_ref != m.root_ref {
                    warn!(version = r.version, "Remote and mirror disagree on the same version");
                }
                debug!(version = r.version, "Already in sync");
                return Ok(PullReport::new(PullOutcome::AlreadyInSync { version: r.version }));
            }
            (_, Some(r)) => r,
        };
        let mirrored = mirror.as_ref().map(|m| m.version);

        let remote_index = diff::index_tree(&self.blobs, &remote.root_ref)?;

        let mut state = self.state.lock();
        // Unsaved edits in open files become part of the local tree first, so
        // the apply below can neither drop nor overwrite them.
        let flushed = self.flush_open_locked(&mut state)?;
        if flushed > 0 {
            debug!(flushed, "Flushed open files before applying remote root");
        }
        let local_ahead = state
            .local
            .as_ref()
            .map_or(false, |l| l.version() > mirrored.unwrap_or(0));
        let diff = if local_ahead {
            let local_index = diff::index_tree(&self.blobs, &state.tree.root_hash())?;
            Some(Diff::compute(&local_index, &remote_index)).filter(|d| !d.local_is_subset())
        } else {
            None
        };

        let applied = match diff {
            None => self.fast_forward(&mut state, &remote, mirrored),
            Some(diff) => self.merge(&mut state, &remote, diff),
        };
        // A partial apply still changed the working tree.
        let invalidated = self.invalidate_cache(&mut state);
        drop(state);
        let mut report = applied?;

        let entries = self.remote.entries(
            mirrored.map_or(0, |v| v + 1),
            Some(remote.version),
            None,
        )?;
        report.versions_mirrored = self.mirror.mirror(&entries)?;

        info!(
            remote_version = remote.version,
            root = %short_hex(&remote.root_ref),
            versions_mirrored = report.versions_mirrored,
            invalidated,
            duration_ms = start.elapsed().as_millis() as u64,
            "Pull complete"
        );
        Ok(report)
    }

    fn fast_forward(
        &self,
        state: &mut FsState,
        remote: &Root,
        mirrored: Option<Version>,
    ) -> Result<PullReport, FsError> {
        let next_inode = state.tree.next_inode();
        state.tree = Tree::load(&self.blobs, &remote.root_ref, next_inode)?;
        state.remote = Some(Mount::remote(remote.clone(), self.options.immutable));

        // A local history numbered past the remote would otherwise keep
        // winning over the tree just loaded.
        if state
            .local
            .as_ref()
            .map_or(false, |l| l.version() >= remote.version)
        {
            self.commit_root(state, remote.root_ref)?;
        }
        info!(from = ?mirrored, to = remote.version, "Fast-forwarded to remote root");
        Ok(PullReport::new(PullOutcome::FastForward {
            from: mirrored,
            to: remote.version,
        }))
    }

    fn merge(
        &self,
        state: &mut FsState,
        remote: &Root,
        diff: Diff,
    ) -> Result<PullReport, FsError> {
        state.remote = Some(Mount::remote(remote.clone(), self.options.immutable));

        for candidate in &diff.deleted_candidates {
            warn!(path = %candidate.path, "Missing on remote; keeping local copy");
        }

        // Paths whose whole remote subtree is already in place.
        let mut covered: Vec<String> = Vec::new();
        let is_covered =
            |covered: &[String], p: &str| covered.iter().any(|c| c == p || path::is_ancestor(c, p));
        let mut conflicted_copies = Vec::new();
        let mut attribute_conflicts = Vec::new();

        for conflict in &diff.conflicted {
            if is_covered(&covered, &conflict.path) {
                continue;
            }
            if conflict.both_dirs() {
                // Content differences surface through the children; only the
                // directory's own attributes can conflict here.
                let ours = Meta::load(&self.blobs, &conflict.local.hash)?;
                let theirs = Meta::load(&self.blobs, &conflict.remote.hash)?;
                if ours.mode != theirs.mode || ours.xattrs != theirs.xattrs {
                    warn!(path = %conflict.path, "Directory attributes differ on remote; keeping local attributes");
                    attribute_conflicts.push(conflict.path.clone());
                }
                continue;
            }
            let target = format!("{}{}", conflict.path, CONFLICT_SUFFIX);
            warn!(path = %conflict.path, copy = %target, "Conflicting change; keeping remote version alongside");
            self.materialize(state, &target, &conflict.remote.hash)?;
            if conflict.local.kind != conflict.remote.kind {
                covered.push(conflict.path.clone());
            }
            conflicted_copies.push(target);
        }

        for added in &diff.added {
            if is_covered(&covered, &added.path) {
                continue;
            }
            self.materialize(state, &added.path, &added.hash)?;
            if added.kind == NodeKind::Dir {
                covered.push(added.path.clone());
            }
        }

        // One WIP version per merge, numbered past the remote so the merged
        // tree stays the active mount and publishes on the next push.
        let merged = state.tree.root_hash();
        let stale = state.local.as_ref().map_or(true, |l| {
            l.version() <= remote.version || l.root.root_ref != merged
        });
        if stale {
            self.append_root(state, merged)?;
        }

        let local_version = state.local.as_ref().map(Mount::version);
        info!(
            remote_version = remote.version,
            local_version = ?local_version,
            added = diff.added.len(),
            conflicts = conflicted_copies.len(),
            attribute_conflicts = attribute_conflicts.len(),
            deleted_candidates = diff.deleted_candidates.len(),
            "Merged remote changes into local tree"
        );
        Ok(PullReport {
            outcome: PullOutcome::Merged {
                remote_version: remote.version,
                local_version,
            },
            versions_mirrored: 0,
            diff: Some(diff),
            conflicted_copies,
            attribute_conflicts,
        })
    }

    /// Graft the stored node `hash` into the working tree at `tree_path`,
    /// creating missing parent directories, and re-hash up to the root. The
    /// caller commits.
    fn materialize(&self, state: &mut FsState, tree_path: &str, hash: &Hash) -> Result<Inode, FsError> {
        let (parent_path, name) = path::parent_and_name(tree_path)?;

        let mut parent = ROOT_INODE;
        for component in path::split_path(&parent_path)? {
            parent = match state.tree.lookup(parent, &component, &self.blobs)? {
                Some(child) if state.tree.get(child)?.is_dir() => child,
                Some(_) => return Err(FsError::NotADirectory(component)),
                None => {
                    state.stats.dirs_created += 1;
                    let meta = Meta::new_dir(&component, DIR_MODE);
                    state.tree.attach(parent, [0u8; 32], meta, &self.blobs)?
                }
            };
        }

        let meta = Meta::load(&self.blobs, hash)?;
        let (hash, meta) = if meta.name == name {
            (*hash, meta)
        } else if meta.is_dir() {
            let mut renamed = meta;
            renamed.name = name;
            (renamed.store(&self.blobs)?, renamed)
        } else {
            FileWriter::new(&self.blobs, self.options.chunk_size).rename(&meta, &name)?
        };
        let kind = meta.kind;
        let inode = state.tree.attach(parent, hash, meta, &self.blobs)?;
        self.propagate_locked(state, parent)?;
        match kind {
            NodeKind::Dir => state.stats.dirs_updated += 1,
            NodeKind::File => state.stats.files_updated += 1,
        }
        Ok(inode)
    }
}
