//! Control surface
//!
//! Serializable views over a running filesystem for tooling: the current
//! root, on-demand sync, version histories and the list of public nodes.

use crate::error::FsError;
use crate::fs::{public_url, FsStats, MirrorFs};
use crate::heads::{Root, RootHead};
use crate::mount::MountKind;
use crate::sync::diff::walk_tree;
use crate::sync::{PullReport, PushReport};
use crate::tree::meta::Meta;
use crate::types::{hash_to_hex, Version};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct RootStatus {
    pub name: String,
    #[serde(rename = "ref")]
    pub root_ref: String,
    pub mount: Option<MountKind>,
    pub version: Option<Version>,
    pub immutable: bool,
    pub local_version: Option<Version>,
    pub remote_version: Option<Version>,
    pub syncs_in_flight: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionRecord {
    pub version: Version,
    #[serde(rename = "ref")]
    pub root_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl From<Root> for VersionRecord {
    fn from(root: Root) -> Self {
        Self {
            version: root.version,
            root_ref: hash_to_hex(&root.root_ref),
            comment: root.comment,
            host: root.host,
        }
    }
}

/// All three root histories
#[derive(Debug, Clone, Serialize)]
pub struct DebugDump {
    pub remote: Vec<VersionRecord>,
    pub remote_mirror: Vec<VersionRecord>,
    pub wip: Vec<VersionRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicNode {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub meta: Meta,
}

pub struct Control {
    fs: Arc<MirrorFs>,
}

impl Control {
    pub fn new(fs: Arc<MirrorFs>) -> Self {
        Self { fs }
    }

    pub fn fs(&self) -> &Arc<MirrorFs> {
        &self.fs
    }

    pub fn root_ref(&self) -> RootStatus {
        let active = self.fs.active_mount();
        RootStatus {
            name: self.fs.name().to_string(),
            root_ref: hash_to_hex(&self.fs.root_ref()),
            mount: active.as_ref().map(|m| m.kind),
            version: active.as_ref().map(|m| m.version()),
            immutable: active.as_ref().map_or(false, |m| m.immutable),
            local_version: self.fs.local_mount().map(|m| m.version()),
            remote_version: self.fs.remote_mount().map(|m| m.version()),
            syncs_in_flight: self.fs.syncs_in_flight(),
        }
    }

    pub fn pull(&self) -> Result<PullReport, FsError> {
        self.fs.pull()
    }

    pub fn push(&self, comment: Option<String>) -> Result<PushReport, FsError> {
        self.fs.push(comment)
    }

    pub fn debug_dump(&self) -> Result<DebugDump, FsError> {
        let history = |head: &RootHead| -> Result<Vec<VersionRecord>, FsError> {
            Ok(head.history()?.into_iter().map(VersionRecord::from).collect())
        };
        Ok(DebugDump {
            remote: history(self.fs.remote_head())?,
            remote_mirror: history(self.fs.mirror_head())?,
            wip: history(self.fs.wip_head())?,
        })
    }

    /// Every node under the current root carrying `public=1`, keyed by hash.
    pub fn public_nodes(&self) -> Result<BTreeMap<String, PublicNode>, FsError> {
        let root = self.fs.root_ref();
        let base = self.fs.options().public_url.clone();
        let mut nodes = BTreeMap::new();
        walk_tree(self.fs.blobs(), &root, |path, hash, meta| {
            if meta.is_public() {
                let hex = hash_to_hex(hash);
                nodes.insert(
                    hex.clone(),
                    PublicNode {
                        path: path.to_string(),
                        url: base
                            .as_deref()
                            .map(|base| public_url(base, meta.is_dir(), &hex)),
                        meta: meta.clone(),
                    },
                );
            }
            Ok(())
        })?;
        Ok(nodes)
    }

    pub fn stats(&self) -> FsStats {
        self.fs.stats()
    }
}
