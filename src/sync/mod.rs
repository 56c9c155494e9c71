//! Synchronization with the remote store
//!
//! - [`diff`]: path indexes and tree comparison
//! - [`pull`]: fast-forward or merge from the remote
//! - [`push`]: upload and publish the local root
//! - [`worker`]: background Pull-then-Push task

pub mod diff;
pub mod pull;
pub mod push;
pub mod worker;

pub use diff::{Conflict, Diff, DiffEntry, IndexEntry, PathIndex};
pub use pull::{PullOutcome, PullReport};
pub use push::PushReport;
pub use worker::{SyncWorker, WorkerStats};

use crate::error::FsError;
use crate::fs::MirrorFs;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub pull: PullReport,
    pub push: PushReport,
}

impl MirrorFs {
    /// One Pull followed by one Push.
    pub fn sync_once(&self) -> Result<SyncReport, FsError> {
        let pull = self.pull()?;
        let push = self.push(None)?;
        Ok(SyncReport { pull, push })
    }
}
