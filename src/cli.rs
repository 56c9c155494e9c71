//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; single route table dispatches to domain services.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::{command_name, is_mutating};
pub use output::{exit_code, map_error};
pub use parse::{Cli, Commands, XattrCommands};
pub use presentation::{
    format_debug_dump_text, format_import_summary, format_listing_text,
    format_public_nodes_text, format_pull_report_text, format_push_report_text,
    format_stats_text, format_status_text, format_worker_stats, ImportSummary,
};
pub use route::RunContext;
