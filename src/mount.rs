//! Mount resolution
//!
//! A filesystem has up to two candidate trees: the local WIP root and the last
//! known remote root. The one with the higher version is active; local wins ties.

use crate::error::FsError;
use crate::heads::Root;
use crate::types::Version;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub kind: MountKind,
    pub immutable: bool,
    pub root: Root,
}

impl Mount {
    pub fn local(root: Root) -> Self {
        Self {
            kind: MountKind::Local,
            immutable: false,
            root,
        }
    }

    pub fn remote(root: Root, immutable: bool) -> Self {
        Self {
            kind: MountKind::Remote,
            immutable,
            root,
        }
    }

    pub fn version(&self) -> Version {
        self.root.version
    }
}

/// Pick the active mount: highest version, local on ties.
pub fn active<'a>(local: Option<&'a Mount>, remote: Option<&'a Mount>) -> Option<&'a Mount> {
    match (local, remote) {
        (Some(l), Some(r)) if r.version() > l.version() => Some(r),
        (Some(l), _) => Some(l),
        (None, r) => r,
    }
}

/// Outcome of comparing the three root records at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Local WIP is ahead of everything remote.
    Wip(Root),
    /// Nothing exists anywhere; start an empty root.
    Fresh,
    /// Local mirror and live remote agree.
    InSync(Root),
    /// Live remote is ahead; mirror versions after `mirrored` and activate `remote`.
    CatchUp {
        mirrored: Option<Version>,
        remote: Root,
    },
}

/// Decide which tree becomes active given WIP, local mirror and live remote.
pub fn resolve(
    wip: Option<&Root>,
    mirror: Option<&Root>,
    remote: Option<&Root>,
) -> Result<Resolution, FsError> {
    let mirror_version = mirror.map(|m| m.version);
    let remote_version = remote.map(|r| r.version);

    if let Some(w) = wip {
        let ahead_of = |v: Option<Version>| v.map_or(true, |v| w.version > v);
        if ahead_of(mirror_version) && ahead_of(remote_version) {
            return Ok(Resolution::Wip(w.clone()));
        }
    }

    match (mirror, remote) {
        (None, None) => Ok(Resolution::Fresh),
        (Some(m), Some(r)) if m.version == r.version => Ok(Resolution::InSync(r.clone())),
        (Some(m), Some(r)) if m.version > r.version => Err(FsError::OutOfSync {
            mirror: m.version,
            remote: Some(r.version),
        }),
        (Some(m), None) => Err(FsError::OutOfSync {
            mirror: m.version,
            remote: None,
        }),
        (m, Some(r)) => Ok(Resolution::CatchUp {
            mirrored: m.map(|m| m.version),
            remote: r.clone(),
        }),
    }
}
