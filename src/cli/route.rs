//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::config::{ConfigLoader, MirrorConfig};
use crate::control::Control;
use crate::error::{FsError, StorageError};
use crate::fs::{FsStores, MirrorFs};
use crate::sync::SyncWorker;
use crate::tree::path;
use crate::types::{hash_to_hex, Inode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::cli::parse::{Commands, XattrCommands};
use crate::cli::presentation::{
    format_debug_dump_text, format_import_summary, format_listing_text,
    format_public_nodes_text, format_pull_report_text, format_push_report_text,
    format_stats_text, format_status_text, format_worker_stats, to_json, ImportSummary,
};
use crate::cli::{command_name, is_mutating};

/// Runtime context for CLI execution: loaded config, the opened filesystem
/// and its control surface. Built from workspace path and optional config
/// path using ConfigLoader only.
pub struct RunContext {
    config: MirrorConfig,
    data_dir: PathBuf,
    control: Control,
}

impl RunContext {
    /// Create run context from workspace root, optional config path and an
    /// optional filesystem name override.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        name: Option<String>,
    ) -> Result<Self, FsError> {
        let mut config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        if let Some(name) = name {
            config.name = name;
            config.validate().map_err(|errors| {
                FsError::ConfigError(
                    errors
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("; "),
                )
            })?;
        }
        Self::from_config(config)
    }

    /// Open the filesystem described by an already loaded config.
    pub fn from_config(config: MirrorConfig) -> Result<Self, FsError> {
        let data_dir = config.storage.resolve_data_dir(&config.name)?;
        std::fs::create_dir_all(&data_dir).map_err(StorageError::IoError)?;
        let remote_dir = config.remote.resolve_path(&data_dir);

        let stores = FsStores::on_disk(&data_dir.join("local.db"), &remote_dir)?;
        let fs = Arc::new(MirrorFs::open(config.fs_options(), stores)?);
        info!(
            name = %config.name,
            data_dir = %data_dir.display(),
            remote = %remote_dir.display(),
            "Opened filesystem"
        );

        Ok(Self {
            config,
            data_dir,
            control: Control::new(fs),
        })
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn fs(&self) -> &Arc<MirrorFs> {
        self.control.fs()
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, FsError> {
        let started = Instant::now();
        let name = command_name(command);
        let result = self.execute_inner(command);
        match &result {
            Ok(_) => info!(
                command = %name,
                duration_ms = started.elapsed().as_millis() as u64,
                "Command finished"
            ),
            Err(e) => warn!(command = %name, error = %e, "Command failed"),
        }
        if result.is_ok() && is_mutating(command) {
            let drain = Duration::from_secs(self.config.sync.drain_timeout_secs);
            if !self.fs().drain(drain) {
                warn!("Timed out waiting for running syncs");
            }
        }
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, FsError> {
        match command {
            Commands::Status { format } => {
                let status = self.control.root_ref();
                if format == "json" {
                    to_json(&status)
                } else {
                    Ok(format_status_text(&status))
                }
            }
            Commands::Ref => Ok(self.control.root_ref().root_ref),
            Commands::Pull { format } => {
                let report = self.control.pull()?;
                if format == "json" {
                    to_json(&report)
                } else {
                    Ok(format_pull_report_text(&report))
                }
            }
            Commands::Push { message, format } => {
                let report = self.control.push(message.clone())?;
                if format == "json" {
                    to_json(&report)
                } else {
                    Ok(format_push_report_text(&report))
                }
            }
            Commands::Debug { format } => {
                let dump = self.control.debug_dump()?;
                if format == "json" {
                    to_json(&dump)
                } else {
                    Ok(format_debug_dump_text(&dump))
                }
            }
            Commands::Public { format } => {
                let nodes = self.control.public_nodes()?;
                if format == "json" {
                    to_json(&nodes)
                } else {
                    Ok(format_public_nodes_text(&nodes))
                }
            }
            Commands::Stats { format } => {
                let stats = self.control.stats();
                if format == "json" {
                    to_json(&stats)
                } else {
                    Ok(format_stats_text(&stats))
                }
            }
            Commands::Config => self.config.to_toml(),
            Commands::Ls { path, format } => self.handle_ls(path, format),
            Commands::Cat { path } => {
                let data = self.fs().read_path(path)?;
                Ok(String::from_utf8_lossy(&data).into_owned())
            }
            Commands::Put { src, dest } => {
                let data = std::fs::read(src).map_err(StorageError::IoError)?;
                let attr = self.fs().write_path(dest, &data)?;
                Ok(format!("{} ({} bytes)", hash_to_hex(&attr.hash), attr.size))
            }
            Commands::Import { dir, dest } => {
                let summary = self.import_dir(dir, dest)?;
                Ok(format_import_summary(&summary, dest))
            }
            Commands::Mkdir { path } => {
                let inode = self.fs().mkdir_all(path)?;
                Ok(hash_to_hex(&self.fs().getattr(inode)?.hash))
            }
            Commands::Rm { path } => {
                let (parent, name) = self.parent_of(path)?;
                self.fs().remove(parent, &name)?;
                Ok(format!("Removed {}", path))
            }
            Commands::Mv { from, to } => {
                let (parent, name) = self.parent_of(from)?;
                let (new_parent, new_name) = self.parent_of(to)?;
                self.fs().rename(parent, &name, new_parent, &new_name)?;
                Ok(format!("{} -> {}", from, to))
            }
            Commands::Xattr { command } => self.handle_xattr(command),
            Commands::Sync { interval } => self.run_sync(*interval),
        }
    }

    fn handle_ls(&self, tree_path: &str, format: &str) -> Result<String, FsError> {
        let inode = self.inode_of(tree_path)?;
        let attr = self.fs().getattr(inode)?;
        let entries = if attr.is_dir() {
            self.fs()
                .readdir(inode)?
                .into_iter()
                .map(|entry| self.fs().getattr(entry.inode))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            vec![attr]
        };
        if format == "json" {
            to_json(&entries)
        } else {
            Ok(format_listing_text(&entries))
        }
    }

    fn handle_xattr(&self, command: &XattrCommands) -> Result<String, FsError> {
        match command {
            XattrCommands::Get { path, name } => {
                let value = self.fs().getxattr(self.inode_of(path)?, name)?;
                Ok(String::from_utf8_lossy(&value).into_owned())
            }
            XattrCommands::Set { path, name, value } => {
                self.fs()
                    .setxattr(self.inode_of(path)?, name, value.as_bytes())?;
                Ok(format!("{}={}", name, value))
            }
            XattrCommands::Rm { path, name } => {
                self.fs().removexattr(self.inode_of(path)?, name)?;
                Ok(format!("Removed {}", name))
            }
            XattrCommands::List { path } => {
                Ok(self.fs().listxattr(self.inode_of(path)?)?.join("\n"))
            }
        }
    }

    /// Run the sync worker until ctrl-c, then wait for in-flight syncs.
    fn run_sync(&self, interval: Option<u64>) -> Result<String, FsError> {
        let secs = interval.unwrap_or(self.config.sync.interval_secs);
        let every = (secs > 0).then(|| Duration::from_secs(secs));
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(StorageError::IoError)?;

        let fs = Arc::clone(self.fs());
        let stats = runtime.block_on(async move {
            let worker = SyncWorker::spawn(Arc::clone(&fs), every);
            fs.trigger_sync();
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for ctrl-c; stopping");
            }
            info!("Shutting down sync worker");
            let stats = worker.stats();
            worker.shutdown().await;
            stats
        });
        Ok(format_worker_stats(&stats))
    }

    /// Copy a host directory tree under `dest`. Symlinks and special files
    /// are skipped.
    fn import_dir(&self, dir: &Path, dest: &str) -> Result<ImportSummary, FsError> {
        let root = dunce::canonicalize(dir).map_err(StorageError::IoError)?;
        let mut summary = ImportSummary::default();

        for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| StorageError::IoError(e.into()))?;
            let relative = entry
                .path()
                .strip_prefix(&root)
                .map_err(|e| FsError::InvalidArgument(e.to_string()))?;
            let target = tree_path_under(dest, relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                self.fs().mkdir_all(&target)?;
                summary.dirs += 1;
            } else if file_type.is_file() {
                let data = std::fs::read(entry.path()).map_err(StorageError::IoError)?;
                self.fs().write_path(&target, &data)?;
                summary.files += 1;
                summary.bytes += data.len() as u64;
            } else {
                warn!(path = %entry.path().display(), "Skipping special file");
                summary.skipped += 1;
            }
        }
        Ok(summary)
    }

    fn inode_of(&self, tree_path: &str) -> Result<Inode, FsError> {
        self.fs()
            .resolve_path(tree_path)?
            .ok_or_else(|| FsError::NotFound(tree_path.to_string()))
    }

    fn parent_of(&self, tree_path: &str) -> Result<(Inode, String), FsError> {
        let (parent_path, name) = path::parent_and_name(tree_path)?;
        Ok((self.inode_of(&parent_path)?, name))
    }
}

/// Tree path for a host path relative to an import root.
fn tree_path_under(dest: &str, relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .fold(dest.to_string(), |acc, name| path::join(&acc, &name))
}
