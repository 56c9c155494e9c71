//! Background sync worker
//!
//! A single tokio task that runs Pull then Push whenever the filesystem's
//! sync signal fires, and optionally on a fixed interval.

use crate::fs::MirrorFs;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Worker counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub runs: u64,
    pub failures: u64,
    pub conflicts: u64,
}

pub struct SyncWorker {
    running: Arc<RwLock<bool>>,
    wake: Arc<Notify>,
    stats: Arc<RwLock<WorkerStats>>,
    handle: JoinHandle<()>,
}

impl SyncWorker {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(fs: Arc<MirrorFs>, every: Option<Duration>) -> Self {
        let running = Arc::new(RwLock::new(true));
        let wake = Arc::new(Notify::new());
        let stats = Arc::new(RwLock::new(WorkerStats::default()));

        let handle = tokio::spawn(Self::worker_loop(
            fs,
            every,
            Arc::clone(&running),
            Arc::clone(&wake),
            Arc::clone(&stats),
        ));
        info!(interval_secs = ?every.map(|d| d.as_secs()), "Started sync worker");

        Self {
            running,
            wake,
            stats,
            handle,
        }
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.read().clone()
    }

    /// Stop the loop and wait for the task. A sync already running finishes first.
    pub async fn shutdown(self) {
        *self.running.write() = false;
        self.wake.notify_one();
        if let Err(e) = self.handle.await {
            error!(error = %e, "Sync worker task failed");
        }
        info!("Stopped sync worker");
    }

    async fn worker_loop(
        fs: Arc<MirrorFs>,
        every: Option<Duration>,
        running: Arc<RwLock<bool>>,
        wake: Arc<Notify>,
        stats: Arc<RwLock<WorkerStats>>,
    ) {
        let signal = fs.sync_signal();
        let mut ticker = every.filter(|d| !d.is_zero()).map(|d| {
            let mut ticker = interval(d);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        while *running.read() {
            let reason = tokio::select! {
                biased;
                _ = wake.notified() => continue,
                _ = signal.notified() => "signal",
                _ = next_tick(&mut ticker) => "interval",
            };
            debug!(reason, "Sync worker woke");

            let start = Instant::now();
            let worker_fs = Arc::clone(&fs);
            let outcome = tokio::task::spawn_blocking(move || worker_fs.sync_once()).await;

            let mut counters = stats.write();
            counters.runs += 1;
            match outcome {
                Ok(Ok(report)) => debug!(
                    published = report.push.published,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Sync run finished"
                ),
                Ok(Err(e)) if e.is_sync_conflict() => {
                    counters.conflicts += 1;
                    warn!(error = %e, "Sync run hit a version conflict; will retry on next wake");
                }
                Ok(Err(e)) => {
                    counters.failures += 1;
                    error!(error = %e, "Sync run failed");
                }
                Err(e) => {
                    counters.failures += 1;
                    error!(error = %e, "Sync task panicked or was cancelled");
                }
            }
            drop(counters);

            if reason == "interval" {
                let fs_stats = fs.stats();
                info!(
                    files_created = fs_stats.files_created,
                    dirs_created = fs_stats.dirs_created,
                    files_updated = fs_stats.files_updated,
                    dirs_updated = fs_stats.dirs_updated,
                    versions_committed = fs_stats.versions_committed,
                    "Filesystem stats"
                );
            }
        }
        debug!("Sync worker loop exited");
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
