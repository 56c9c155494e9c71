//! Directory and node operations on the working tree

use crate::integration::test_utils::{names, read_string, SharedRemote};
use mirrorfs::error::FsError;
use mirrorfs::fs::{MirrorFs, SetAttr};
use mirrorfs::tree::meta::NodeKind;
use mirrorfs::types::ROOT_INODE;

fn fs() -> MirrorFs {
    SharedRemote::new().client("nodes")
}

#[test]
fn test_mkdir_create_lookup() {
    let fs = fs();
    let dir = fs.mkdir(ROOT_INODE, "src", Some(0o700)).unwrap();
    assert_eq!(dir.kind, NodeKind::Dir);
    assert_eq!(dir.mode, 0o700);

    let file = fs.create(dir.inode, "main.rs", None).unwrap();
    assert_eq!(file.kind, NodeKind::File);
    assert_eq!(file.size, 0);
    fs.release(file.inode).unwrap();

    let found = fs.lookup(dir.inode, "main.rs").unwrap();
    assert_eq!(found.inode, file.inode);
    assert_eq!(fs.path_of(file.inode).unwrap(), "/src/main.rs");
    assert_eq!(names(&fs, "/src"), vec!["main.rs"]);
}

#[test]
fn test_duplicate_names_rejected() {
    let fs = fs();
    fs.mkdir(ROOT_INODE, "a", None).unwrap();
    assert!(matches!(
        fs.mkdir(ROOT_INODE, "a", None),
        Err(FsError::Exists(_))
    ));
    assert!(matches!(
        fs.create(ROOT_INODE, "a", None),
        Err(FsError::Exists(_))
    ));
}

#[test]
fn test_names_are_nfc_normalized() {
    let fs = fs();
    let decomposed = "cafe\u{301}";
    let composed = "caf\u{e9}";
    let attr = fs.mkdir(ROOT_INODE, decomposed, None).unwrap();
    assert_eq!(attr.name, composed);
    assert_eq!(fs.lookup(ROOT_INODE, composed).unwrap().inode, attr.inode);
    assert_eq!(fs.lookup(ROOT_INODE, decomposed).unwrap().inode, attr.inode);
}

#[test]
fn test_invalid_names_rejected() {
    let fs = fs();
    for bad in ["", ".", "..", "a/b"] {
        assert!(matches!(
            fs.mkdir(ROOT_INODE, bad, None),
            Err(FsError::InvalidArgument(_))
        ));
    }
}

#[test]
fn test_every_change_commits_a_new_root() {
    let fs = fs();
    let before = fs.root_ref();
    let v0 = fs.local_mount().unwrap().version();

    fs.mkdir_all("/a/b").unwrap();
    let after_mkdir = fs.root_ref();
    assert_ne!(before, after_mkdir);

    fs.write_path("/a/b/c.txt", b"content").unwrap();
    assert_ne!(after_mkdir, fs.root_ref());
    assert!(fs.local_mount().unwrap().version() > v0);
    assert_eq!(
        fs.wip_head().latest().unwrap().unwrap().root_ref,
        fs.root_ref()
    );
    assert!(fs.stats().versions_committed >= 3);
}

#[test]
fn test_remove() {
    let fs = fs();
    fs.write_path("/dir/file.txt", b"x").unwrap();
    let dir = fs.resolve_path("/dir").unwrap().unwrap();

    assert!(matches!(
        fs.remove(ROOT_INODE, "dir"),
        Err(FsError::DirectoryNotEmpty(_))
    ));
    fs.remove(dir, "file.txt").unwrap();
    fs.remove(ROOT_INODE, "dir").unwrap();
    assert!(fs.resolve_path("/dir").unwrap().is_none());
    assert!(matches!(
        fs.remove(ROOT_INODE, "dir"),
        Err(FsError::NotFound(_))
    ));
}

#[test]
fn test_rename_file_and_directory() {
    let fs = fs();
    fs.write_path("/a/one.txt", b"one").unwrap();
    fs.mkdir_all("/b").unwrap();
    let a = fs.resolve_path("/a").unwrap().unwrap();
    let b = fs.resolve_path("/b").unwrap().unwrap();

    fs.rename(a, "one.txt", b, "uno.txt").unwrap();
    assert_eq!(read_string(&fs, "/b/uno.txt"), "one");
    assert!(fs.resolve_path("/a/one.txt").unwrap().is_none());
    assert_eq!(fs.lookup(b, "uno.txt").unwrap().name, "uno.txt");

    fs.rename(ROOT_INODE, "b", a, "nested").unwrap();
    assert_eq!(read_string(&fs, "/a/nested/uno.txt"), "one");
}

#[test]
fn test_rename_replaces_file_but_not_nonempty_dir() {
    let fs = fs();
    fs.write_path("/old.txt", b"old").unwrap();
    fs.write_path("/new.txt", b"new").unwrap();
    fs.rename(ROOT_INODE, "new.txt", ROOT_INODE, "old.txt").unwrap();
    assert_eq!(read_string(&fs, "/old.txt"), "new");
    assert_eq!(names(&fs, "/"), vec!["old.txt"]);

    fs.write_path("/full/x", b"x").unwrap();
    fs.mkdir_all("/other").unwrap();
    assert!(matches!(
        fs.rename(ROOT_INODE, "other", ROOT_INODE, "full"),
        Err(FsError::DirectoryNotEmpty(_))
    ));
}

#[test]
fn test_rename_into_own_subtree_rejected() {
    let fs = fs();
    fs.mkdir_all("/a/b").unwrap();
    let b = fs.resolve_path("/a/b").unwrap().unwrap();
    assert!(matches!(
        fs.rename(ROOT_INODE, "a", b, "a"),
        Err(FsError::InvalidArgument(_))
    ));
}

#[test]
fn test_setattr_mode_and_mtime() {
    let fs = fs();
    let attr = fs.write_path("/f", b"data").unwrap();
    let updated = fs
        .setattr(
            attr.inode,
            SetAttr {
                mode: Some(0o600),
                mtime: Some("2020-01-01T00:00:00Z".to_string()),
                ..SetAttr::default()
            },
        )
        .unwrap();
    assert_eq!(updated.mode, 0o600);
    assert_eq!(updated.mtime, "2020-01-01T00:00:00Z");
    assert_eq!(updated.size, 4);
    assert_ne!(updated.hash, attr.hash);
}

#[test]
fn test_lookup_errors() {
    let fs = fs();
    fs.write_path("/file", b"x").unwrap();
    let file = fs.resolve_path("/file").unwrap().unwrap();
    assert!(matches!(
        fs.lookup(ROOT_INODE, "missing"),
        Err(FsError::NotFound(_))
    ));
    assert!(matches!(
        fs.lookup(file, "child"),
        Err(FsError::NotADirectory(_))
    ));
    assert!(matches!(fs.readdir(file), Err(FsError::NotADirectory(_))));
    assert!(matches!(fs.getattr(9999), Err(FsError::NotFound(_))));
}
