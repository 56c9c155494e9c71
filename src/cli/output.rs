//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::FsError;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &FsError) -> String {
    if e.is_sync_conflict() {
        return format!("{} (pull first, then retry)", e);
    }
    e.to_string()
}

/// Process exit code for an error: the errno a mount would have returned.
pub fn exit_code(e: &FsError) -> i32 {
    match e {
        FsError::ConfigError(_) => 78,
        _ => e.errno(),
    }
}
