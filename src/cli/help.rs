//! CLI help and command-name contract for logging and routing.

use crate::cli::parse::{Commands, XattrCommands};

/// Command name string for log spans (e.g. "pull", "xattr.set").
pub fn command_name(command: &Commands) -> String {
    match command {
        Commands::Status { .. } => "status".to_string(),
        Commands::Ref => "ref".to_string(),
        Commands::Pull { .. } => "pull".to_string(),
        Commands::Push { .. } => "push".to_string(),
        Commands::Debug { .. } => "debug".to_string(),
        Commands::Public { .. } => "public".to_string(),
        Commands::Stats { .. } => "stats".to_string(),
        Commands::Config => "config".to_string(),
        Commands::Ls { .. } => "ls".to_string(),
        Commands::Cat { .. } => "cat".to_string(),
        Commands::Put { .. } => "put".to_string(),
        Commands::Import { .. } => "import".to_string(),
        Commands::Mkdir { .. } => "mkdir".to_string(),
        Commands::Rm { .. } => "rm".to_string(),
        Commands::Mv { .. } => "mv".to_string(),
        Commands::Xattr { command } => format!("xattr.{}", xattr_command_name(command)),
        Commands::Sync { .. } => "sync".to_string(),
    }
}

pub fn xattr_command_name(command: &XattrCommands) -> &'static str {
    match command {
        XattrCommands::Get { .. } => "get",
        XattrCommands::Set { .. } => "set",
        XattrCommands::Rm { .. } => "rm",
        XattrCommands::List { .. } => "list",
    }
}

/// True for commands that change the tree or the stores.
pub fn is_mutating(command: &Commands) -> bool {
    match command {
        Commands::Pull { .. }
        | Commands::Push { .. }
        | Commands::Put { .. }
        | Commands::Import { .. }
        | Commands::Mkdir { .. }
        | Commands::Rm { .. }
        | Commands::Mv { .. }
        | Commands::Sync { .. } => true,
        Commands::Xattr { command } => {
            matches!(command, XattrCommands::Set { .. } | XattrCommands::Rm { .. })
        }
        _ => false,
    }
}
