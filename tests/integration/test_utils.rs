//! Shared test utilities for integration tests
//!
//! In-memory remotes shared between several filesystem instances, and
//! serialized environment isolation for tests that touch XDG or MIRRORFS_*
//! variables.

use mirrorfs::fs::{FsOptions, FsStores, MirrorFs};
use mirrorfs::store::{BlobBackend, MemoryBlobBackend, MemoryVersionedStore, VersionedStore};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// A remote that several clients can mount
#[derive(Clone, Default)]
pub struct SharedRemote {
    pub blobs: Arc<MemoryBlobBackend>,
    pub kv: Arc<MemoryVersionedStore>,
}

impl SharedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh local stores in front of this remote.
    pub fn stores(&self) -> FsStores {
        let blobs: Arc<dyn BlobBackend> = self.blobs.clone();
        let kv: Arc<dyn VersionedStore> = self.kv.clone();
        FsStores::with_remote(blobs, kv)
    }

    /// A new client with its own empty local stores.
    pub fn client(&self, name: &str) -> MirrorFs {
        self.client_with(FsOptions::new(name))
    }

    pub fn client_with(&self, options: FsOptions) -> MirrorFs {
        MirrorFs::open(options, self.stores()).unwrap()
    }
}

/// Local stores kept around so a client can be reopened over them.
#[derive(Clone)]
pub struct Client {
    pub stores: FsStores,
}

impl Client {
    pub fn on(remote: &SharedRemote) -> Self {
        Self {
            stores: remote.stores(),
        }
    }

    pub fn open(&self, options: FsOptions) -> MirrorFs {
        MirrorFs::open(options, self.stores.clone()).unwrap()
    }
}

pub fn read_string(fs: &MirrorFs, path: &str) -> String {
    String::from_utf8(fs.read_path(path).unwrap()).unwrap()
}

/// Sorted names under a directory.
pub fn names(fs: &MirrorFs, dir: &str) -> Vec<String> {
    let inode = fs.resolve_path(dir).unwrap().unwrap();
    let mut names: Vec<String> = fs
        .readdir(inode)
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    names.sort();
    names
}

/// Environment variable state to restore after test
struct EnvState {
    vars: Vec<(&'static str, Option<String>)>,
}

const ISOLATED_VARS: &[&str] = &[
    "HOME",
    "XDG_CONFIG_HOME",
    "XDG_DATA_HOME",
    "MIRRORFS_ENV",
    "MIRRORFS__NAME",
    "MIRRORFS__IMMUTABLE",
    "MIRRORFS__SYNC__INTERVAL_SECS",
];

impl EnvState {
    fn capture() -> Self {
        Self {
            vars: ISOLATED_VARS
                .iter()
                .map(|name| (*name, std::env::var(name).ok()))
                .collect(),
        }
    }

    fn restore(self) {
        for (name, value) in self.vars {
            match value {
                Some(v) => std::env::set_var(name, v),
                None => std::env::remove_var(name),
            }
        }
    }
}

/// Run `f` with HOME and XDG directories pointed into `test_dir` and every
/// MIRRORFS_* override cleared. The original environment is restored after.
pub fn with_xdg_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let test_config_home = test_dir.path().join("config");
    let test_data_home = test_dir.path().join("data");
    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_config_home).unwrap();
    std::fs::create_dir_all(&test_data_home).unwrap();
    std::fs::create_dir_all(&test_home).unwrap();

    for name in ISOLATED_VARS.iter().filter(|n| n.starts_with("MIRRORFS")) {
        std::env::remove_var(name);
    }
    std::env::set_var("HOME", test_home.to_str().unwrap());
    std::env::set_var("XDG_CONFIG_HOME", test_config_home.to_str().unwrap());
    std::env::set_var("XDG_DATA_HOME", test_data_home.to_str().unwrap());

    let result = f();

    env_state.restore();
    result
}
