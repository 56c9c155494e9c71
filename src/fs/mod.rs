//! Filesystem context
//!
//! [`MirrorFs`] is the single context object every operation goes through. It
//! owns the content store, the three root heads, the working tree and the
//! locks. Several instances can live in one process.
//!
//! Locking:
//! - `state` is the tree lock. Every node operation holds it for its duration.
//! - `sync_gate` serializes Pull and Push. Remote reads and uploads happen
//!   under the gate only; the tree lock is taken for the short apply phase.
//! - `in_flight` lets shutdown wait for running syncs.

mod file;
mod ops;
mod save;
mod xattr;

pub use ops::{Attr, DirEntry, SetAttr};
pub use xattr::{public_url, REF_XATTR, URL_XATTR};

use crate::concurrency::InFlight;
use crate::error::{FsError, StorageError};
use crate::heads::{RootHead, Track};
use crate::mount::{self, Mount, Resolution};
use crate::store::persistence::open_db;
use crate::store::{
    BlobBackend, ContentStore, DirBlobBackend, MemoryBlobBackend, MemoryVersionedStore,
    SledBlobBackend, SledVersionedStore, VersionedStore,
};
use crate::tree::chunker::DEFAULT_CHUNK_SIZE;
use crate::tree::Tree;
use crate::types::{short_hex, Hash, Inode, ROOT_INODE};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, instrument, warn};

/// Runtime options for one mounted filesystem
#[derive(Debug, Clone)]
pub struct FsOptions {
    pub name: String,
    /// Remote mounts reject mutation when set.
    pub immutable: bool,
    pub hostname: Option<String>,
    /// Base for the virtual `url` attribute of public nodes.
    pub public_url: Option<String>,
    pub chunk_size: usize,
    /// Open-file buffers larger than this move to a temp file.
    pub spill_threshold: Option<u64>,
    pub max_file_size: u64,
}

impl FsOptions {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl Default for FsOptions {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            immutable: false,
            hostname: None,
            public_url: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            spill_threshold: Some(64 * 1024 * 1024),
            max_file_size: i64::MAX as u64,
        }
    }
}

/// Local and remote store handles
#[derive(Clone)]
pub struct FsStores {
    pub local_blobs: Arc<dyn BlobBackend>,
    pub remote_blobs: Arc<dyn BlobBackend>,
    pub local_kv: Arc<dyn VersionedStore>,
    pub remote_kv: Arc<dyn VersionedStore>,
}

impl FsStores {
    /// Fresh in-memory local stores in front of the given remote.
    pub fn with_remote(
        remote_blobs: Arc<dyn BlobBackend>,
        remote_kv: Arc<dyn VersionedStore>,
    ) -> Self {
        Self {
            local_blobs: Arc::new(MemoryBlobBackend::new()),
            remote_blobs,
            local_kv: Arc::new(MemoryVersionedStore::new()),
            remote_kv,
        }
    }

    /// Sled-backed local stores in one database at `local_db`, and a remote
    /// kept in `remote_dir` (blob files plus a sled version database).
    pub fn on_disk(local_db: &Path, remote_dir: &Path) -> Result<Self, StorageError> {
        let db = open_db(local_db)?;
        Ok(Self {
            local_blobs: Arc::new(SledBlobBackend::from_db(&db)?),
            remote_blobs: Arc::new(DirBlobBackend::new(remote_dir)?),
            local_kv: Arc::new(SledVersionedStore::from_db(&db)?),
            remote_kv: Arc::new(SledVersionedStore::new(remote_dir.join("versions.db"))?),
        })
    }

    /// Everything in memory, remote included.
    pub fn in_memory() -> Self {
        Self::with_remote(
            Arc::new(MemoryBlobBackend::new()),
            Arc::new(MemoryVersionedStore::new()),
        )
    }
}

/// Receives kernel cache invalidations after the working tree changes under it
pub trait Invalidator: Send + Sync {
    fn invalidate(&self, inode: Inode);
}

/// Operation counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FsStats {
    pub files_created: u64,
    pub dirs_created: u64,
    pub files_updated: u64,
    pub dirs_updated: u64,
    pub versions_committed: u64,
}

/// Everything guarded by the tree lock
pub(crate) struct FsState {
    pub(crate) tree: Tree,
    pub(crate) local: Option<Mount>,
    pub(crate) remote: Option<Mount>,
    /// Inodes the kernel side has been handed since the last invalidation.
    pub(crate) cached: HashSet<Inode>,
    pub(crate) stats: FsStats,
}

impl FsState {
    pub(crate) fn active(&self) -> Option<&Mount> {
        mount::active(self.local.as_ref(), self.remote.as_ref())
    }

    pub(crate) fn immutable(&self) -> bool {
        self.active().map_or(false, |m| m.immutable)
    }
}

pub struct MirrorFs {
    pub(crate) options: FsOptions,
    pub(crate) blobs: ContentStore,
    pub(crate) wip: RootHead,
    pub(crate) mirror: RootHead,
    pub(crate) remote: RootHead,
    pub(crate) state: Mutex<FsState>,
    pub(crate) sync_gate: Mutex<()>,
    pub(crate) in_flight: InFlight,
    sync_signal: Arc<Notify>,
    invalidator: Option<Arc<dyn Invalidator>>,
}

impl MirrorFs {
    /// Build the context and resolve which root to mount.
    pub fn open(options: FsOptions, stores: FsStores) -> Result<Self, FsError> {
        Self::open_with(options, stores, None)
    }

    pub fn open_with(
        options: FsOptions,
        stores: FsStores,
        invalidator: Option<Arc<dyn Invalidator>>,
    ) -> Result<Self, FsError> {
        let name = options.name.clone();
        let fs = Self {
            blobs: ContentStore::new(stores.local_blobs, stores.remote_blobs),
            wip: RootHead::new(Arc::clone(&stores.local_kv), Track::Wip, &name),
            mirror: RootHead::new(stores.local_kv, Track::Remote, &name),
            remote: RootHead::new(stores.remote_kv, Track::Remote, &name),
            state: Mutex::new(FsState {
                tree: Tree::empty(ROOT_INODE + 1),
                local: None,
                remote: None,
                cached: HashSet::new(),
                stats: FsStats::default(),
            }),
            sync_gate: Mutex::new(()),
            in_flight: InFlight::new(),
            sync_signal: Arc::new(Notify::new()),
            invalidator,
            options,
        };
        fs.load_root()?;
        Ok(fs)
    }

    #[instrument(skip(self), fields(fs = %self.options.name))]
    fn load_root(&self) -> Result<(), FsError> {
        let wip = self.wip.latest()?;
        let mirror = self.mirror.latest()?;
        let remote = self.remote.latest()?;
        let resolution = mount::resolve(wip.as_ref(), mirror.as_ref(), remote.as_ref())?;

        let immutable = self.options.immutable;
        let mut state = self.state.lock();
        let next_inode = state.tree.next_inode();
        // Only a WIP strictly ahead of the remote side is mounted locally. A
        // WIP that merely ties the remote was published and yields to it.
        state.local = None;

        match resolution {
            Resolution::Wip(root) => {
                state.tree = Tree::load(&self.blobs, &root.root_ref, next_inode)?;
                state.local = Some(Mount::local(root.clone()));
                state.remote = mirror.map(|m| Mount::remote(m, immutable));
                info!(version = root.version, root = %short_hex(&root.root_ref), "Mounted local WIP root");
            }
            Resolution::Fresh => {
                state.tree = Tree::empty(next_inode);
                self.save_locked(&mut state, ROOT_INODE)?;
                info!("Initialized empty root");
            }
            Resolution::InSync(root) => {
                state.tree = Tree::load(&self.blobs, &root.root_ref, next_inode)?;
                info!(version = root.version, root = %short_hex(&root.root_ref), "Mounted remote root, already in sync");
                state.remote = Some(Mount::remote(root, immutable));
            }
            Resolution::CatchUp { mirrored, remote } => {
                let entries =
                    self.remote
                        .entries(mirrored.map_or(0, |v| v + 1), Some(remote.version), None)?;
                let copied = self.mirror.mirror(&entries)?;
                state.tree = Tree::load(&self.blobs, &remote.root_ref, next_inode)?;
                info!(
                    from = ?mirrored,
                    to = remote.version,
                    versions_mirrored = copied,
                    "Mounted remote root after catching up"
                );
                state.remote = Some(Mount::remote(remote, immutable));
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn options(&self) -> &FsOptions {
        &self.options
    }

    pub fn blobs(&self) -> &ContentStore {
        &self.blobs
    }

    pub fn wip_head(&self) -> &RootHead {
        &self.wip
    }

    pub fn mirror_head(&self) -> &RootHead {
        &self.mirror
    }

    pub fn remote_head(&self) -> &RootHead {
        &self.remote
    }

    /// Hash of the working tree root.
    pub fn root_ref(&self) -> Hash {
        self.state.lock().tree.root_hash()
    }

    pub fn active_mount(&self) -> Option<Mount> {
        self.state.lock().active().cloned()
    }

    pub fn local_mount(&self) -> Option<Mount> {
        self.state.lock().local.clone()
    }

    pub fn remote_mount(&self) -> Option<Mount> {
        self.state.lock().remote.clone()
    }

    pub fn stats(&self) -> FsStats {
        self.state.lock().stats.clone()
    }

    /// Signal the background worker watches.
    pub fn sync_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.sync_signal)
    }

    /// Ask the background worker for a Pull-then-Push.
    pub fn trigger_sync(&self) {
        self.sync_signal.notify_one();
    }

    /// Number of Pull/Push calls currently running.
    pub fn syncs_in_flight(&self) -> usize {
        self.in_flight.current()
    }

    /// Wait for running syncs to finish. Returns false on timeout.
    pub fn drain(&self, timeout: Duration) -> bool {
        let drained = self.in_flight.wait_idle(timeout);
        if !drained {
            warn!(in_flight = self.in_flight.current(), "Timed out draining sync operations");
        }
        drained
    }

    /// Drop every cached kernel entry. Returns how many were invalidated.
    pub(crate) fn invalidate_cache(&self, state: &mut FsState) -> usize {
        let mut inodes: Vec<Inode> = state.cached.drain().collect();
        if !inodes.contains(&ROOT_INODE) {
            inodes.push(ROOT_INODE);
        }
        if let Some(invalidator) = &self.invalidator {
            for inode in &inodes {
                invalidator.invalidate(*inode);
            }
        }
        inodes.len()
    }

    pub(crate) fn ensure_mutable(&self, state: &FsState, op: &str) -> Result<(), FsError> {
        if state.immutable() {
            return Err(FsError::PermissionDenied(format!(
                "{} on immutable mount '{}'",
                op, self.options.name
            )));
        }
        Ok(())
    }
}
