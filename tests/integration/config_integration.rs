//! Configuration layering and CLI context wiring

use crate::integration::test_utils::with_xdg_env;
use mirrorfs::cli::{Commands, RunContext};
use mirrorfs::config::{ConfigLoader, MirrorConfig};
use mirrorfs::error::FsError;
use mirrorfs::mount::MountKind;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_workspace_config(workspace: &Path, file: &str, body: &str) {
    let dir = workspace.join("config");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(file), body).unwrap();
}

#[test]
fn test_defaults_without_any_file() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    let config = with_xdg_env(&test_dir, || ConfigLoader::load(workspace.path()).unwrap());
    assert_eq!(config.name, MirrorConfig::default().name);
    assert_eq!(config.sync.interval_secs, 60);
    assert!(!config.immutable);
    assert!(config.remote.public_url.is_none());
}

#[test]
fn test_workspace_files_layer_over_global() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    let global_dir = test_dir.path().join("config").join("mirrorfs");
    fs::create_dir_all(&global_dir).unwrap();
    fs::write(
        global_dir.join("config.toml"),
        "name = \"global\"\nhostname = \"laptop\"\n",
    )
    .unwrap();
    write_workspace_config(
        workspace.path(),
        "config.toml",
        "name = \"notes\"\n\n[sync]\ninterval_secs = 15\n",
    );
    write_workspace_config(
        workspace.path(),
        "development.toml",
        "[remote]\npublic_url = \"https://files.example.org\"\n",
    );

    let config = with_xdg_env(&test_dir, || ConfigLoader::load(workspace.path()).unwrap());
    assert_eq!(config.name, "notes");
    assert_eq!(config.hostname.as_deref(), Some("laptop"));
    assert_eq!(config.sync.interval_secs, 15);
    assert_eq!(
        config.remote.public_url.as_deref(),
        Some("https://files.example.org")
    );
}

#[test]
fn test_environment_overrides_files() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_workspace_config(
        workspace.path(),
        "config.toml",
        "[sync]\ninterval_secs = 15\n",
    );

    let config = with_xdg_env(&test_dir, || {
        std::env::set_var("MIRRORFS__SYNC__INTERVAL_SECS", "5");
        ConfigLoader::load(workspace.path())
    })
    .unwrap();
    assert_eq!(config.sync.interval_secs, 5);
}

#[test]
fn test_invalid_configs_rejected() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    let missing = with_xdg_env(&test_dir, || {
        ConfigLoader::load_from_file(&workspace.path().join("absent.toml"))
    });
    assert!(matches!(missing, Err(FsError::ConfigError(_))));

    write_workspace_config(workspace.path(), "config.toml", "name = \"a/b\"\n");
    let bad_name = with_xdg_env(&test_dir, || ConfigLoader::load(workspace.path()));
    assert!(matches!(bad_name, Err(FsError::ConfigError(_))));

    let bad_override = with_xdg_env(&test_dir, || {
        RunContext::new(workspace.path().to_path_buf(), None, Some("x:y".to_string()))
    });
    assert!(matches!(bad_override, Err(FsError::ConfigError(_))));
}

#[test]
fn test_two_contexts_share_a_remote_directory() {
    let dir = TempDir::new().unwrap();
    let remote = dir.path().join("remote");
    let config_for = |data: &str| {
        let mut config = MirrorConfig::default();
        config.name = "shared".to_string();
        config.storage.data_dir = Some(dir.path().join(data));
        config.remote.path = Some(remote.clone());
        config
    };

    let src = dir.path().join("todo.txt");
    fs::write(&src, b"buy milk").unwrap();
    {
        let a = RunContext::from_config(config_for("a")).unwrap();
        a.execute(&Commands::Put {
            src,
            dest: "/todo.txt".to_string(),
        })
        .unwrap();
        a.execute(&Commands::Push {
            message: Some("from a".to_string()),
            format: "text".to_string(),
        })
        .unwrap();
    }

    let b = RunContext::from_config(config_for("b")).unwrap();
    assert_eq!(b.data_dir(), dir.path().join("b").join("shared"));
    let out = b
        .execute(&Commands::Cat {
            path: "/todo.txt".to_string(),
        })
        .unwrap();
    assert_eq!(out, "buy milk");
    let mount = b.fs().active_mount().unwrap();
    assert_eq!(mount.kind, MountKind::Remote);
}
