//! Name and path normalization for tree entries

use crate::error::FsError;
use unicode_normalization::UnicodeNormalization;

/// Suffix given to the remote copy of a conflicting entry.
pub const CONFLICT_SUFFIX: &str = ".conflicted";

/// Validate a single entry name and normalize it to NFC
pub fn normalize_name(name: &str) -> Result<String, FsError> {
    let normalized: String = name.nfc().collect();
    if normalized.is_empty() || normalized == "." || normalized == ".." {
        return Err(FsError::InvalidArgument(format!(
            "Invalid entry name '{}'",
            name
        )));
    }
    if normalized.contains('/') || normalized.contains('\0') {
        return Err(FsError::InvalidArgument(format!(
            "Entry name '{}' contains a separator",
            name
        )));
    }
    Ok(normalized)
}

/// Split an absolute tree path into normalized components
///
/// Repeated and trailing slashes are ignored; `/` yields no components.
pub fn split_path(path: &str) -> Result<Vec<String>, FsError> {
    path.split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .map(normalize_name)
        .collect()
}

/// Join a parent tree path and a child name
pub fn join(parent: &str, name: &str) -> String {
    if parent == "/" || parent.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Parent path and final component of a tree path
pub fn parent_and_name(path: &str) -> Result<(String, String), FsError> {
    let mut components = split_path(path)?;
    let name = components
        .pop()
        .ok_or_else(|| FsError::InvalidArgument("The root has no parent".to_string()))?;
    Ok((format!("/{}", components.join("/")), name))
}

/// Number of components in a tree path
pub fn depth(path: &str) -> usize {
    path.split('/').filter(|c| !c.is_empty()).count()
}

/// True if `ancestor` is a strict ancestor of `path`
pub fn is_ancestor(ancestor: &str, path: &str) -> bool {
    if ancestor == "/" {
        return path != "/";
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}
