//! Startup mount resolution against local and remote root histories

use crate::integration::test_utils::{read_string, Client, SharedRemote};
use mirrorfs::error::FsError;
use mirrorfs::fs::FsOptions;
use mirrorfs::mount::MountKind;

#[test]
fn test_fresh_filesystem_commits_empty_root() {
    let remote = SharedRemote::new();
    let fs = remote.client("docs");

    let active = fs.active_mount().unwrap();
    assert_eq!(active.kind, MountKind::Local);
    assert_eq!(active.version(), 1);
    assert!(fs.remote_mount().is_none());
    assert_eq!(fs.wip_head().history().unwrap().len(), 1);
    assert!(fs.readdir(mirrorfs::types::ROOT_INODE).unwrap().is_empty());
}

#[test]
fn test_reopen_mounts_local_wip() {
    let remote = SharedRemote::new();
    let client = Client::on(&remote);
    let root = {
        let fs = client.open(FsOptions::new("docs"));
        fs.write_path("/notes/today.txt", b"groceries").unwrap();
        fs.root_ref()
    };

    let fs = client.open(FsOptions::new("docs"));
    assert_eq!(fs.root_ref(), root);
    assert_eq!(fs.active_mount().unwrap().kind, MountKind::Local);
    assert_eq!(read_string(&fs, "/notes/today.txt"), "groceries");
}

#[test]
fn test_second_client_mounts_published_remote() {
    let remote = SharedRemote::new();
    let a = remote.client("docs");
    a.write_path("/readme.md", b"hello").unwrap();
    let pushed = a.push(None).unwrap();
    assert!(pushed.published);

    let b = remote.client("docs");
    let active = b.active_mount().unwrap();
    assert_eq!(active.kind, MountKind::Remote);
    assert_eq!(Some(active.version()), pushed.version);
    assert_eq!(b.root_ref(), a.root_ref());
    assert_eq!(read_string(&b, "/readme.md"), "hello");
    assert_eq!(b.mirror_head().history().unwrap().len(), 1);
}

#[test]
fn test_edit_on_remote_mount_continues_version_sequence() {
    let remote = SharedRemote::new();
    let a = remote.client("docs");
    a.mkdir_all("/a").unwrap();
    let published = a.push(None).unwrap().version.unwrap();

    let b = remote.client("docs");
    b.mkdir_all("/b").unwrap();
    let local = b.local_mount().unwrap();
    assert_eq!(local.version(), published + 1);
    assert_eq!(b.active_mount().unwrap().kind, MountKind::Local);
}

#[test]
fn test_reopen_catches_up_with_newer_remote() {
    let remote = SharedRemote::new();
    let a = remote.client("docs");
    a.write_path("/one.txt", b"1").unwrap();
    a.push(None).unwrap();

    let b_client = Client::on(&remote);
    drop(b_client.open(FsOptions::new("docs")));

    a.write_path("/two.txt", b"2").unwrap();
    let latest = a.push(None).unwrap().version.unwrap();

    let b = b_client.open(FsOptions::new("docs"));
    assert_eq!(b.active_mount().unwrap().version(), latest);
    assert_eq!(read_string(&b, "/two.txt"), "2");
    let mirrored: Vec<u64> = b
        .mirror_head()
        .history()
        .unwrap()
        .iter()
        .map(|r| r.version)
        .collect();
    assert_eq!(mirrored.last(), Some(&latest));
    assert_eq!(mirrored.len(), 2);
}

#[test]
fn test_remote_behind_mirror_refuses_to_mount() {
    let remote = SharedRemote::new();
    let a = remote.client("docs");
    a.mkdir_all("/x").unwrap();
    let first = a.push(None).unwrap().version.unwrap();
    a.mkdir_all("/y").unwrap();
    a.push(None).unwrap();

    let b_client = Client::on(&remote);
    drop(b_client.open(FsOptions::new("docs")));

    remote.kv.truncate_after("mirrorfs:root:docs", first);
    let err = match mirrorfs::fs::MirrorFs::open(FsOptions::new("docs"), b_client.stores.clone()) {
        Ok(_) => panic!("mount should fail when the remote regressed"),
        Err(e) => e,
    };
    assert!(matches!(err, FsError::OutOfSync { .. }));
    assert!(err.is_sync_conflict());
}

#[test]
fn test_names_are_isolated() {
    let remote = SharedRemote::new();
    let docs = remote.client("docs");
    docs.write_path("/a.txt", b"a").unwrap();
    docs.push(None).unwrap();

    let photos = remote.client("photos");
    assert_eq!(photos.active_mount().unwrap().kind, MountKind::Local);
    assert!(photos.resolve_path("/a.txt").unwrap().is_none());
}
