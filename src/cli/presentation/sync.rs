//! Pull, push, history and worker presentation.

use super::shared::{abbreviate, new_table, or_dash, section_heading};
use crate::control::{DebugDump, VersionRecord};
use crate::sync::{PullOutcome, PullReport, PushReport, WorkerStats};
use owo_colors::OwoColorize;

pub fn format_pull_report_text(report: &PullReport) -> String {
    let mut out = match &report.outcome {
        PullOutcome::NoRemote => "Nothing published to the remote yet.".to_string(),
        PullOutcome::AlreadyInSync { version } => {
            format!("Already in sync at version {}.", version)
        }
        PullOutcome::FastForward { from, to } => format!(
            "{} {} -> {}",
            "Fast-forwarded".green(),
            or_dash(*from),
            to
        ),
        PullOutcome::Merged {
            remote_version,
            local_version,
        } => format!(
            "{} remote version {} into local version {}",
            "Merged".yellow(),
            remote_version,
            or_dash(*local_version)
        ),
    };
    if report.versions_mirrored > 0 {
        out.push_str(&format!(
            "\nMirrored {} remote version(s).",
            report.versions_mirrored
        ));
    }
    if let Some(diff) = &report.diff {
        out.push_str(&format!(
            "\nAdded: {}  Conflicted: {}  Local only: {}",
            diff.added.len(),
            diff.conflicted.len(),
            diff.deleted_candidates.len()
        ));
        for entry in &diff.deleted_candidates {
            out.push_str(&format!("\n  local only: {}", entry.path));
        }
    }
    for copy in &report.conflicted_copies {
        out.push_str(&format!("\n  {} {}", "conflict copy:".red(), copy));
    }
    for dir in &report.attribute_conflicts {
        out.push_str(&format!("\n  {} {}", "kept local attributes:".yellow(), dir));
    }
    out
}

pub fn format_push_report_text(report: &PushReport) -> String {
    if !report.published {
        return match report.version {
            Some(v) => format!("Remote already at version {}; nothing to publish.", v),
            None => "Nothing to publish.".to_string(),
        };
    }
    format!(
        "{} version {} ({})\nBlobs uploaded: {}  already present: {}",
        "Published".green(),
        or_dash(report.version),
        report.root.as_deref().unwrap_or("-"),
        report.blobs_uploaded,
        report.blobs_skipped
    )
}

fn history_table(records: &[VersionRecord]) -> String {
    if records.is_empty() {
        return "  (empty)".to_string();
    }
    let mut table = new_table(vec!["Version", "Root", "Host", "Comment"]);
    for r in records {
        table.add_row(vec![
            r.version.to_string(),
            abbreviate(&r.root_ref).to_string(),
            r.host.clone().unwrap_or_default(),
            r.comment.clone().unwrap_or_default(),
        ]);
    }
    table.to_string()
}

pub fn format_debug_dump_text(dump: &DebugDump) -> String {
    [
        ("Remote", &dump.remote),
        ("Remote mirror", &dump.remote_mirror),
        ("WIP", &dump.wip),
    ]
    .iter()
    .map(|(title, records)| format!("{}\n{}", section_heading(title), history_table(records)))
    .collect::<Vec<_>>()
    .join("\n\n")
}

pub fn format_worker_stats(stats: &WorkerStats) -> String {
    format!(
        "Sync worker stopped: {} run(s), {} failure(s), {} conflict(s)",
        stats.runs, stats.failures, stats.conflicts
    )
}
