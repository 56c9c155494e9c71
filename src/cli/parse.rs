//! CLI parse: clap types for mirrorfs. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// mirrorfs - synchronizing content-addressed filesystem
#[derive(Parser)]
#[command(name = "mirrorfs")]
#[command(about = "Synchronizing content-addressed filesystem built on Merkle trees")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (where config/ is looked up)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Filesystem name (overrides the configured name)
    #[arg(long)]
    pub name: Option<String>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the active mount, versions and root hash
    Status {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the current root hash
    Ref,
    /// Fetch remote changes and merge or fast-forward
    Pull {
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Publish the local root to the remote
    Push {
        /// Comment recorded with the published root
        #[arg(short, long)]
        message: Option<String>,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Dump the remote, mirror and WIP root histories
    Debug {
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List nodes marked public
    Public {
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show operation counters
    Stats {
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the effective configuration
    Config,
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print a file's content
    Cat { path: String },
    /// Copy a local file into the tree
    Put { src: PathBuf, dest: String },
    /// Copy a local directory tree into the tree
    Import {
        dir: PathBuf,
        #[arg(default_value = "/")]
        dest: String,
    },
    /// Create a directory and any missing parents
    Mkdir { path: String },
    /// Remove a file or empty directory
    Rm { path: String },
    /// Move or rename an entry
    Mv { from: String, to: String },
    /// Extended attributes
    Xattr {
        #[command(subcommand)]
        command: XattrCommands,
    },
    /// Run the background sync worker until interrupted
    Sync {
        /// Seconds between syncs (0 = only on change); defaults to config
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum XattrCommands {
    /// Read one attribute
    Get { path: String, name: String },
    /// Set an attribute (`public` = 1 publishes a subtree)
    Set {
        path: String,
        name: String,
        value: String,
    },
    /// Remove an attribute
    Rm { path: String, name: String },
    /// List attribute names
    List { path: String },
}
