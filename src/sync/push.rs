//! Push: publish the local root to the remote
//!
//! Blobs are uploaded from a snapshot of the local root hash, so local edits
//! continue while the upload runs. The remote commit is conditional on the
//! remote still being at the last mirrored version.

use super::diff;
use crate::error::FsError;
use crate::fs::MirrorFs;
use crate::mount::{Mount, MountKind};
use crate::store::Precondition;
use crate::types::{hash_to_hex, short_hex, Version};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub published: bool,
    pub version: Option<Version>,
    pub root: Option<String>,
    pub blobs_uploaded: usize,
    pub blobs_skipped: usize,
}

impl MirrorFs {
    #[instrument(skip(self, comment), fields(fs = %self.options.name))]
    pub fn push(&self, comment: Option<String>) -> Result<PushReport, FsError> {
        let _op = self.in_flight.begin();
        let _gate = self.sync_gate.lock();
        let start = Instant::now();

        let local = {
            let state = self.state.lock();
            match state.active() {
                Some(mount) if mount.kind == MountKind::Local => mount.root.clone(),
                _ => {
                    debug!("Active mount is not local; nothing to push");
                    return Ok(PushReport::default());
                }
            }
        };

        let mirror = self.mirror.latest()?;
        let mirror_version = mirror.as_ref().map(|m| m.version);
        if let Some(remote_version) = self.remote.latest_version()? {
            if mirror_version.map_or(true, |m| remote_version > m) {
                warn!(
                    remote_version,
                    mirror_version = ?mirror_version,
                    "Remote moved since the last pull; the commit will be rejected"
                );
            }
        }

        let mut report = PushReport {
            version: Some(local.version),
            root: Some(hash_to_hex(&local.root_ref)),
            ..PushReport::default()
        };
        for hash in diff::collect_refs(&self.blobs, &local.root_ref)? {
            if self.blobs.stat_remote(&hash)? {
                report.blobs_skipped += 1;
                continue;
            }
            let data = self.blobs.get(&hash)?;
            self.blobs.put_remote(&hash, &data)?;
            report.blobs_uploaded += 1;
        }

        if mirror
            .as_ref()
            .map_or(false, |m| m.version == local.version && m.root_ref == local.root_ref)
        {
            debug!(version = local.version, "Root already published");
            return Ok(report);
        }

        let mut root = local.clone();
        root.comment = comment;
        root.host = self.options.hostname.clone();
        let committed = self.remote.commit(
            &root,
            Some(local.version),
            Precondition::expecting(mirror_version),
        )?;
        self.mirror
            .commit(&committed, Some(committed.version), Precondition::Any)?;
        self.state.lock().remote = Some(Mount::remote(committed.clone(), self.options.immutable));

        report.published = true;
        info!(
            version = committed.version,
            root = %short_hex(&committed.root_ref),
            blobs_uploaded = report.blobs_uploaded,
            blobs_skipped = report.blobs_skipped,
            duration_ms = start.elapsed().as_millis() as u64,
            "Pushed local root"
        );
        Ok(report)
    }
}
