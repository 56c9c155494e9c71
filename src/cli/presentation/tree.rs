//! Listing, public node and import presentation.

use super::shared::{abbreviate, new_table};
use crate::control::PublicNode;
use crate::fs::Attr;
use crate::tree::meta::NodeKind;
use crate::types::hash_to_hex;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::collections::BTreeMap;

/// Counts from copying a host directory into the tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub files: usize,
    pub dirs: usize,
    pub bytes: u64,
    pub skipped: usize,
}

pub fn format_listing_text(entries: &[Attr]) -> String {
    if entries.is_empty() {
        return "(empty directory)".to_string();
    }
    let mut table = new_table(vec!["Name", "Kind", "Mode", "Size", "Modified", "Hash"]);
    for attr in entries {
        let name = if attr.is_dir() {
            format!("{}/", attr.name.blue())
        } else {
            attr.name.clone()
        };
        let kind = match attr.kind {
            NodeKind::Dir => "dir",
            NodeKind::File => "file",
        };
        table.add_row(vec![
            name,
            kind.to_string(),
            format!("{:o}", attr.mode),
            attr.size.to_string(),
            attr.mtime.clone(),
            abbreviate(&hash_to_hex(&attr.hash)).to_string(),
        ]);
    }
    table.to_string()
}

pub fn format_public_nodes_text(nodes: &BTreeMap<String, PublicNode>) -> String {
    if nodes.is_empty() {
        return "No public nodes.".to_string();
    }
    let mut table = new_table(vec!["Path", "Hash", "URL"]);
    for (hash, node) in nodes {
        table.add_row(vec![
            node.path.clone(),
            abbreviate(hash).to_string(),
            node.url.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table.to_string()
}

pub fn format_import_summary(summary: &ImportSummary, dest: &str) -> String {
    let mut out = format!(
        "Imported {} file(s) and {} dir(s) into {} ({} bytes)",
        summary.files, summary.dirs, dest, summary.bytes
    );
    if summary.skipped > 0 {
        out.push_str(&format!(
            "\n{} {} entr(ies) that are neither files nor directories",
            "Skipped".yellow(),
            summary.skipped
        ));
    }
    out
}
