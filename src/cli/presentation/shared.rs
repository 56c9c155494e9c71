//! Shared presentation helpers: json rendering, tables, headings.

use crate::error::{FsError, StorageError};
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;

pub fn to_json<T: Serialize>(value: &T) -> Result<String, FsError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| FsError::Storage(StorageError::Encoding(e.to_string())))
}

pub fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(header);
    table
}

pub fn section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// First 12 hex characters, enough to tell hashes apart in a listing.
pub fn abbreviate(hex: &str) -> &str {
    hex.get(..12).unwrap_or(hex)
}
