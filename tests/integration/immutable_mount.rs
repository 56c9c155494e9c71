//! Read-only behavior while the remote mount is active

use crate::integration::test_utils::{read_string, Client, SharedRemote};
use mirrorfs::error::FsError;
use mirrorfs::fs::{FsOptions, MirrorFs, SetAttr};
use mirrorfs::mount::MountKind;
use mirrorfs::sync::PullOutcome;
use mirrorfs::types::{hash_to_hex, ROOT_INODE};

fn immutable_client(remote: &SharedRemote) -> MirrorFs {
    let mut options = FsOptions::new("docs");
    options.immutable = true;
    remote.client_with(options)
}

fn published_remote() -> SharedRemote {
    let remote = SharedRemote::new();
    let writer = remote.client("docs");
    writer.write_path("/docs/guide.md", b"read me").unwrap();
    writer.push(None).unwrap();
    remote
}

fn is_denied<T>(result: Result<T, FsError>) -> bool {
    matches!(result, Err(FsError::PermissionDenied(_)))
}

#[test]
fn test_mutations_rejected() {
    let remote = published_remote();
    let fs = immutable_client(&remote);
    let active = fs.active_mount().unwrap();
    assert_eq!(active.kind, MountKind::Remote);
    assert!(active.immutable);

    let docs = fs.resolve_path("/docs").unwrap().unwrap();
    let guide = fs.resolve_path("/docs/guide.md").unwrap().unwrap();

    assert!(is_denied(fs.mkdir(ROOT_INODE, "new", None)));
    assert!(is_denied(fs.create(docs, "new.md", None)));
    assert!(is_denied(fs.remove(docs, "guide.md")));
    assert!(is_denied(fs.rename(docs, "guide.md", docs, "moved.md")));
    assert!(is_denied(fs.setattr(
        guide,
        SetAttr {
            mode: Some(0o600),
            ..SetAttr::default()
        }
    )));
    assert!(is_denied(fs.setxattr(guide, "user.tag", b"x")));
    assert!(is_denied(fs.setxattr(docs, "public", b"1")));

    fs.open(guide).unwrap();
    assert!(is_denied(fs.write(guide, 0, b"overwrite")));
    fs.release(guide).unwrap();

    assert_eq!(read_string(&fs, "/docs/guide.md"), "read me");
    assert_eq!(fs.wip_head().latest().unwrap(), None);
}

#[test]
fn test_reads_and_virtual_attributes_allowed() {
    let remote = published_remote();
    let fs = immutable_client(&remote);
    let guide = fs.resolve_path("/docs/guide.md").unwrap().unwrap();

    fs.open(guide).unwrap();
    assert_eq!(fs.read(guide, 0, 4).unwrap(), b"read");
    fs.release(guide).unwrap();

    let hash = hash_to_hex(&fs.getattr(guide).unwrap().hash);
    assert_eq!(fs.getxattr(guide, "ref").unwrap(), hash.as_bytes());
    // Writes to the computed attributes are accepted and ignored.
    fs.setxattr(guide, "ref", b"ignored").unwrap();
    assert_eq!(fs.getxattr(guide, "ref").unwrap(), hash.as_bytes());
    assert!(matches!(
        fs.removexattr(guide, "ref"),
        Err(FsError::PermissionDenied(_))
    ));
    assert!(matches!(
        fs.getxattr(guide, "url"),
        Err(FsError::NoXattr(_))
    ));
    assert!(fs.listxattr(guide).unwrap().contains(&"ref".to_string()));
}

#[test]
fn test_immutable_client_keeps_following_remote() {
    let remote = published_remote();
    let fs = immutable_client(&remote);

    let writer = remote.client("docs");
    writer.write_path("/docs/changelog.md", b"v2").unwrap();
    let version = writer.push(None).unwrap().version.unwrap();

    let report = fs.pull().unwrap();
    assert!(matches!(report.outcome, PullOutcome::FastForward { to, .. } if to == version));
    assert_eq!(read_string(&fs, "/docs/changelog.md"), "v2");
    assert!(fs.active_mount().unwrap().immutable);

    // Nothing local to publish.
    let pushed = fs.push(None).unwrap();
    assert!(!pushed.published);
    assert_eq!(pushed.version, None);
}

#[test]
fn test_fresh_immutable_filesystem_is_writable_locally() {
    let remote = SharedRemote::new();
    let fs = immutable_client(&remote);
    assert_eq!(fs.active_mount().unwrap().kind, MountKind::Local);
    fs.mkdir_all("/local").unwrap();
    assert!(fs.resolve_path("/local").unwrap().is_some());
}

#[test]
fn test_reopen_after_push_mounts_remote_read_only() {
    let remote = SharedRemote::new();
    let client = Client::on(&remote);
    let published = {
        let fs = client.open(FsOptions::new("docs"));
        fs.write_path("/a.txt", b"alpha").unwrap();
        fs.push(None).unwrap().version.unwrap()
    };

    // WIP, mirror and remote now tie; the published remote root is mounted.
    let mut options = FsOptions::new("docs");
    options.immutable = true;
    let fs = client.open(options);
    let active = fs.active_mount().unwrap();
    assert_eq!(active.kind, MountKind::Remote);
    assert_eq!(active.version(), published);
    assert!(active.immutable);
    assert!(fs.local_mount().is_none());

    assert!(is_denied(fs.mkdir(ROOT_INODE, "x", None)));
    assert_eq!(fs.wip_head().latest_version().unwrap(), Some(published));
    assert_eq!(read_string(&fs, "/a.txt"), "alpha");
}
