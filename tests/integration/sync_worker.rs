//! Background sync worker

use crate::integration::test_utils::{read_string, SharedRemote};
use mirrorfs::fs::MirrorFs;
use mirrorfs::sync::SyncWorker;
use std::sync::Arc;
use std::time::Duration;

/// Poll `check` until it holds or two seconds pass.
async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

fn remote_version(fs: &MirrorFs) -> Option<u64> {
    fs.remote_head().latest_version().unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_signal_triggers_push() {
    let remote = SharedRemote::new();
    let fs = Arc::new(remote.client("docs"));
    let worker = SyncWorker::spawn(Arc::clone(&fs), None);

    fs.write_path("/hello.txt", b"hi").unwrap();
    fs.trigger_sync();

    let published = eventually(|| remote_version(&fs).is_some()).await;
    assert!(published, "worker never pushed");
    assert_eq!(
        fs.remote_head().latest().unwrap().unwrap().root_ref,
        fs.root_ref()
    );

    let stats = worker.stats();
    assert!(stats.runs >= 1);
    assert_eq!(stats.failures, 0);
    worker.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_public_flag_wakes_worker() {
    let remote = SharedRemote::new();
    let fs = Arc::new(remote.client("docs"));
    fs.write_path("/site/index.html", b"<p>").unwrap();
    let worker = SyncWorker::spawn(Arc::clone(&fs), None);

    let site = fs.resolve_path("/site").unwrap().unwrap();
    fs.setxattr(site, "public", b"1").unwrap();

    let fs_check = Arc::clone(&fs);
    assert!(
        eventually(move || {
            fs_check
                .remote_head()
                .latest()
                .unwrap()
                .map_or(false, |r| r.root_ref == fs_check.root_ref())
        })
        .await
    );
    worker.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interval_keeps_clients_converged() {
    let remote = SharedRemote::new();
    let a = Arc::new(remote.client("docs"));
    let b = Arc::new(remote.client("docs"));
    let every = Some(Duration::from_millis(20));
    let worker_a = SyncWorker::spawn(Arc::clone(&a), every);
    let worker_b = SyncWorker::spawn(Arc::clone(&b), every);

    a.write_path("/from-a.txt", b"a").unwrap();
    let b_check = Arc::clone(&b);
    assert!(eventually(move || b_check.resolve_path("/from-a.txt").unwrap().is_some()).await);
    assert_eq!(read_string(&b, "/from-a.txt"), "a");

    worker_a.shutdown().await;
    worker_b.shutdown().await;
    assert!(a.drain(Duration::from_secs(1)));
    assert_eq!(a.syncs_in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_without_activity() {
    let remote = SharedRemote::new();
    let fs = Arc::new(remote.client("docs"));
    let worker = SyncWorker::spawn(Arc::clone(&fs), None);
    let stats = worker.stats();
    worker.shutdown().await;
    assert_eq!(stats.runs, 0);
    assert!(fs.drain(Duration::from_millis(10)));
}
