//! Pull and push between clients sharing one remote

use crate::integration::test_utils::{names, read_string, Client, SharedRemote};
use mirrorfs::control::Control;
use mirrorfs::error::{FsError, StorageError};
use mirrorfs::fs::{FsOptions, Invalidator, MirrorFs};
use mirrorfs::mount::MountKind;
use mirrorfs::sync::PullOutcome;
use mirrorfs::types::{hash_to_hex, Inode, ROOT_INODE};
use parking_lot::Mutex;
use std::sync::Arc;

#[test]
fn test_pull_without_remote() {
    let remote = SharedRemote::new();
    let fs = remote.client("docs");
    let report = fs.pull().unwrap();
    assert_eq!(report.outcome, PullOutcome::NoRemote);
    assert_eq!(report.versions_mirrored, 0);
}

#[test]
fn test_push_publishes_then_is_idempotent() {
    let remote = SharedRemote::new();
    let fs = remote.client("docs");
    fs.write_path("/a.txt", b"alpha").unwrap();

    let first = fs.push(Some("initial".to_string())).unwrap();
    assert!(first.published);
    assert!(first.blobs_uploaded > 0);
    assert_eq!(first.version, Some(fs.local_mount().unwrap().version()));
    assert_eq!(first.root, Some(hash_to_hex(&fs.root_ref())));

    let published = fs.remote_head().latest().unwrap().unwrap();
    assert_eq!(published.root_ref, fs.root_ref());
    assert_eq!(published.comment.as_deref(), Some("initial"));
    assert_eq!(fs.mirror_head().latest().unwrap().unwrap(), published);

    let second = fs.push(None).unwrap();
    assert!(!second.published);
    assert_eq!(second.blobs_uploaded, 0);
    assert_eq!(fs.remote_head().history().unwrap().len(), 1);

    let report = fs.pull().unwrap();
    assert_eq!(
        report.outcome,
        PullOutcome::AlreadyInSync {
            version: published.version
        }
    );
}

#[test]
fn test_push_skips_blobs_already_on_remote() {
    let remote = SharedRemote::new();
    let fs = remote.client("docs");
    fs.write_path("/big.txt", b"unchanged content").unwrap();
    fs.push(None).unwrap();

    fs.write_path("/small.txt", b"new").unwrap();
    let report = fs.push(None).unwrap();
    assert!(report.published);
    assert!(report.blobs_skipped > 0);
    assert!(report.blobs_uploaded > 0);
}

#[test]
fn test_fast_forward_to_remote() {
    let remote = SharedRemote::new();
    let a = remote.client("docs");
    let b_client = Client::on(&remote);
    let b = b_client.open(FsOptions::new("docs"));

    a.write_path("/shared/plan.md", b"step one").unwrap();
    let version = a.push(None).unwrap().version.unwrap();

    let report = b.pull().unwrap();
    assert_eq!(
        report.outcome,
        PullOutcome::FastForward {
            from: None,
            to: version
        }
    );
    assert_eq!(report.versions_mirrored, 1);
    assert!(report.diff.is_none());
    assert_eq!(b.root_ref(), a.root_ref());
    assert_eq!(b.active_mount().unwrap().kind, MountKind::Remote);
    assert_eq!(read_string(&b, "/shared/plan.md"), "step one");

    // Editing on top of the pulled tree continues past the remote version.
    b.write_path("/shared/plan.md", b"step two").unwrap();
    assert!(b.local_mount().unwrap().version() > version);
    assert!(b.push(None).unwrap().published);

    let report = a.pull().unwrap();
    assert!(matches!(report.outcome, PullOutcome::FastForward { .. }));
    assert_eq!(read_string(&a, "/shared/plan.md"), "step two");
}

#[test]
fn test_fast_forward_over_higher_local_history() {
    let remote = SharedRemote::new();
    let a = remote.client("docs");
    let b = remote.client("docs");
    a.mkdir_all("/from-a").unwrap();
    let published = a.push(None).unwrap().version.unwrap();

    // B churns through local versions but ends with nothing the remote lacks.
    for _ in 0..5 {
        b.mkdir(ROOT_INODE, "scratch", None).unwrap();
        b.remove(ROOT_INODE, "scratch").unwrap();
    }
    assert!(b.local_mount().unwrap().version() > published);

    let report = b.pull().unwrap();
    assert!(matches!(report.outcome, PullOutcome::FastForward { .. }));
    assert_eq!(b.root_ref(), a.root_ref());
    let active = b.active_mount().unwrap();
    assert_eq!(active.kind, MountKind::Local);
    assert!(active.version() > published);

    assert!(b.push(None).unwrap().published);
    let report = a.pull().unwrap();
    assert!(matches!(report.outcome, PullOutcome::FastForward { .. }));
    assert_eq!(names(&a, "/"), vec!["from-a"]);
}

#[test]
fn test_diverged_clients_merge() {
    let remote = SharedRemote::new();
    let a = remote.client("docs");
    a.write_path("/common.txt", b"base").unwrap();
    a.push(None).unwrap();

    let b = remote.client("docs");
    b.write_path("/from-b.txt", b"bee").unwrap();
    b.push(None).unwrap();

    a.write_path("/from-a.txt", b"ay").unwrap();
    let err = a.push(None).unwrap_err();
    assert!(matches!(
        err,
        FsError::Storage(StorageError::VersionConflict { .. })
    ));

    let report = a.pull().unwrap();
    assert!(matches!(report.outcome, PullOutcome::Merged { .. }));
    let diff = report.diff.as_ref().unwrap();
    assert_eq!(
        diff.added.iter().map(|e| e.path.as_str()).collect::<Vec<_>>(),
        vec!["/from-b.txt"]
    );
    assert_eq!(
        diff.deleted_candidates
            .iter()
            .map(|e| e.path.as_str())
            .collect::<Vec<_>>(),
        vec!["/from-a.txt"]
    );
    assert!(report.conflicted_copies.is_empty());
    assert_eq!(
        names(&a, "/"),
        vec!["common.txt", "from-a.txt", "from-b.txt"]
    );

    // The merged tree publishes cleanly and B fast-forwards onto it.
    assert!(a.push(None).unwrap().published);
    let report = b.pull().unwrap();
    assert!(matches!(report.outcome, PullOutcome::FastForward { .. }));
    assert_eq!(read_string(&b, "/from-a.txt"), "ay");
}

#[test]
fn test_conflicting_edits_keep_both_versions() {
    let remote = SharedRemote::new();
    let a = remote.client("docs");
    a.write_path("/notes.txt", b"original").unwrap();
    a.push(None).unwrap();

    let b = remote.client("docs");
    b.write_path("/notes.txt", b"edited by b").unwrap();
    b.push(None).unwrap();

    a.write_path("/notes.txt", b"edited by a").unwrap();
    let report = a.pull().unwrap();
    assert_eq!(report.conflicted_copies, vec!["/notes.txt.conflicted"]);
    assert_eq!(read_string(&a, "/notes.txt"), "edited by a");
    assert_eq!(read_string(&a, "/notes.txt.conflicted"), "edited by b");
}

#[test]
fn test_kind_conflict_materializes_remote_subtree() {
    let remote = SharedRemote::new();
    let a = remote.client("docs");
    let b = remote.client("docs");

    b.write_path("/thing/inner.txt", b"inside").unwrap();
    b.push(None).unwrap();

    a.write_path("/thing", b"a plain file").unwrap();
    let report = a.pull().unwrap();
    assert_eq!(report.conflicted_copies, vec!["/thing.conflicted"]);
    assert_eq!(read_string(&a, "/thing"), "a plain file");
    assert_eq!(read_string(&a, "/thing.conflicted/inner.txt"), "inside");
    assert!(a.resolve_path("/thing/inner.txt").unwrap().is_none());
}

#[test]
fn test_merge_creates_nested_directories() {
    let remote = SharedRemote::new();
    let a = remote.client("docs");
    let b = remote.client("docs");

    b.write_path("/deep/er/still/file.txt", b"nested").unwrap();
    b.write_path("/extra.txt", b"more").unwrap();
    b.push(None).unwrap();

    a.write_path("/deep/local.txt", b"mine").unwrap();
    let history = a.wip_head().history().unwrap().len();
    let report = a.pull().unwrap();
    assert!(matches!(report.outcome, PullOutcome::Merged { .. }));
    // Several materialized entries, one WIP version.
    assert_eq!(a.wip_head().history().unwrap().len(), history + 1);
    assert_eq!(read_string(&a, "/extra.txt"), "more");
    // Differing children alone are not an attribute conflict.
    assert!(report.attribute_conflicts.is_empty());
    assert_eq!(read_string(&a, "/deep/er/still/file.txt"), "nested");
    assert_eq!(read_string(&a, "/deep/local.txt"), "mine");
}

#[test]
fn test_merge_without_materialized_entries_moves_past_remote() {
    let remote = SharedRemote::new();
    let a = remote.client("docs");
    a.mkdir_all("/d").unwrap();
    a.push(None).unwrap();

    let b_client = Client::on(&remote);
    let b = b_client.open(FsOptions::new("docs"));
    assert!(b.local_mount().is_none());

    let d = a.resolve_path("/d").unwrap().unwrap();
    a.setxattr(d, "user.tag", b"one").unwrap();
    a.setxattr(d, "user.tag", b"two").unwrap();
    let remote_version = a.push(None).unwrap().version.unwrap();

    b.write_path("/new.txt", b"local only").unwrap();
    assert_eq!(b.local_mount().unwrap().version(), remote_version);

    // Only a directory attribute conflict and a local-only file: nothing is
    // materialized, yet the merged tree must still outrank the remote.
    let report = b.pull().unwrap();
    assert!(matches!(report.outcome, PullOutcome::Merged { .. }));
    assert!(report.conflicted_copies.is_empty());
    assert_eq!(report.attribute_conflicts, vec!["/d"]);
    let active = b.active_mount().unwrap();
    assert_eq!(active.kind, MountKind::Local);
    assert!(active.version() > remote_version);

    let pushed = b.push(None).unwrap();
    assert!(pushed.published);
    assert!(pushed.version.unwrap() > remote_version);

    drop(b);
    let b = b_client.open(FsOptions::new("docs"));
    assert_eq!(read_string(&b, "/new.txt"), "local only");

    let report = a.pull().unwrap();
    assert!(matches!(report.outcome, PullOutcome::FastForward { .. }));
    assert_eq!(read_string(&a, "/new.txt"), "local only");
}

#[test]
fn test_pull_keeps_unsaved_edits_in_open_files() {
    let remote = SharedRemote::new();
    let a = remote.client("docs");
    a.write_path("/notes.txt", b"v1").unwrap();
    a.push(None).unwrap();

    let b = remote.client("docs");
    let notes = b.resolve_path("/notes.txt").unwrap().unwrap();
    b.open(notes).unwrap();
    b.write(notes, 0, b"edited by b").unwrap();

    a.write_path("/other.txt", b"from a").unwrap();
    a.push(None).unwrap();

    let report = b.pull().unwrap();
    assert!(matches!(report.outcome, PullOutcome::Merged { .. }));
    assert_eq!(b.read(notes, 0, 64).unwrap(), b"edited by b");

    b.release(notes).unwrap();
    assert_eq!(read_string(&b, "/notes.txt"), "edited by b");
    assert_eq!(read_string(&b, "/notes.txt.conflicted"), "v1");
    assert_eq!(read_string(&b, "/other.txt"), "from a");
}

#[test]
fn test_pull_fails_when_remote_regressed() {
    let remote = SharedRemote::new();
    let a = remote.client("docs");
    a.mkdir_all("/one").unwrap();
    let first = a.push(None).unwrap().version.unwrap();
    a.mkdir_all("/two").unwrap();
    a.push(None).unwrap();

    remote.kv.truncate_after("mirrorfs:root:docs", first);
    let err = a.pull().unwrap_err();
    assert!(matches!(err, FsError::OutOfSync { .. }));
}

#[derive(Default)]
struct RecordingInvalidator {
    inodes: Mutex<Vec<Inode>>,
}

impl Invalidator for RecordingInvalidator {
    fn invalidate(&self, inode: Inode) {
        self.inodes.lock().push(inode);
    }
}

#[test]
fn test_pull_invalidates_cached_entries() {
    let remote = SharedRemote::new();
    let a = remote.client("docs");
    a.write_path("/x.txt", b"x").unwrap();
    a.push(None).unwrap();

    let recorder = Arc::new(RecordingInvalidator::default());
    let invalidator: Arc<dyn Invalidator> = recorder.clone();
    let b = MirrorFs::open_with(FsOptions::new("docs"), remote.stores(), Some(invalidator)).unwrap();
    let looked_up = b.lookup(ROOT_INODE, "x.txt").unwrap();

    a.write_path("/y.txt", b"y").unwrap();
    a.push(None).unwrap();
    b.pull().unwrap();

    let invalidated = recorder.inodes.lock().clone();
    assert!(invalidated.contains(&ROOT_INODE));
    assert!(invalidated.contains(&looked_up.inode));
}

#[test]
fn test_public_nodes_and_urls() {
    let remote = SharedRemote::new();
    let mut options = FsOptions::new("docs");
    options.public_url = Some("https://files.example.org/".to_string());
    let fs = remote.client_with(options);

    fs.write_path("/site/index.html", b"<h1>hi</h1>").unwrap();
    fs.write_path("/private.txt", b"secret").unwrap();
    let site = fs.resolve_path("/site").unwrap().unwrap();
    fs.setxattr(site, "public", b"1").unwrap();

    let index = fs.resolve_path("/site/index.html").unwrap().unwrap();
    assert_eq!(fs.getxattr(index, "public").unwrap(), b"1");
    let url = String::from_utf8(fs.getxattr(index, "url").unwrap()).unwrap();
    let hash = hash_to_hex(&fs.getattr(index).unwrap().hash);
    assert_eq!(url, format!("https://files.example.org/f/{}", hash));

    // New children of a public directory start out public.
    let page = fs.create(site, "about.html", None).unwrap();
    fs.release(page.inode).unwrap();
    assert_eq!(fs.getxattr(page.inode, "public").unwrap(), b"1");

    let control = Control::new(Arc::new(fs));
    let public = control.public_nodes().unwrap();
    let paths: Vec<&str> = public.values().map(|n| n.path.as_str()).collect();
    assert_eq!(public.len(), 3);
    assert!(paths.contains(&"/site"));
    assert!(paths.contains(&"/site/index.html"));
    assert!(!paths.contains(&"/private.txt"));
    assert!(public.values().all(|n| n.url.is_some()));

    let fs = control.fs();
    fs.removexattr(site, "public").unwrap();
    assert!(control.public_nodes().unwrap().is_empty());
}

#[test]
fn test_control_debug_dump_tracks_histories() {
    let remote = SharedRemote::new();
    let fs = Arc::new(remote.client("docs"));
    fs.mkdir_all("/a").unwrap();
    let control = Control::new(Arc::clone(&fs));
    control.push(Some("snapshot".to_string())).unwrap();

    let dump = control.debug_dump().unwrap();
    assert_eq!(dump.remote.len(), 1);
    assert_eq!(dump.remote_mirror.len(), 1);
    assert_eq!(dump.remote[0].comment.as_deref(), Some("snapshot"));
    assert!(dump.wip.len() >= 2);

    let status = control.root_ref();
    assert_eq!(status.root_ref, hash_to_hex(&fs.root_ref()));
    assert_eq!(status.mount, Some(MountKind::Local));
    assert_eq!(status.remote_version, Some(dump.remote[0].version));
}
