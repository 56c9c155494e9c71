//! Status, stats and config presentation.

use super::shared::{new_table, or_dash, section_heading};
use crate::control::RootStatus;
use crate::fs::FsStats;
use crate::mount::MountKind;
use owo_colors::OwoColorize;

pub fn format_status_text(status: &RootStatus) -> String {
    let mount = match status.mount {
        Some(MountKind::Local) => format!("{}", "local".green()),
        Some(MountKind::Remote) if status.immutable => {
            format!("{} {}", "remote".cyan(), "(read-only)".yellow())
        }
        Some(MountKind::Remote) => format!("{}", "remote".cyan()),
        None => format!("{}", "none".red()),
    };

    let mut lines = vec![section_heading(&format!("Filesystem {}", status.name))];
    lines.push(format!("  Mount:          {}", mount));
    lines.push(format!("  Root:           {}", status.root_ref));
    lines.push(format!("  Version:        {}", or_dash(status.version)));
    lines.push(format!("  Local version:  {}", or_dash(status.local_version)));
    lines.push(format!("  Remote version: {}", or_dash(status.remote_version)));
    if status.syncs_in_flight > 0 {
        lines.push(format!(
            "  Syncs running:  {}",
            status.syncs_in_flight.to_string().yellow()
        ));
    }
    lines.join("\n")
}

pub fn format_stats_text(stats: &FsStats) -> String {
    let mut table = new_table(vec!["Counter", "Value"]);
    table.add_row(vec!["files created".to_string(), stats.files_created.to_string()]);
    table.add_row(vec!["dirs created".to_string(), stats.dirs_created.to_string()]);
    table.add_row(vec!["files updated".to_string(), stats.files_updated.to_string()]);
    table.add_row(vec!["dirs updated".to_string(), stats.dirs_updated.to_string()]);
    table.add_row(vec![
        "versions committed".to_string(),
        stats.versions_committed.to_string(),
    ]);
    table.to_string()
}
