//! CLI presentation: text and json formatters per command family.

mod shared;
mod status;
mod sync;
mod tree;

pub use shared::to_json;
pub use status::{format_stats_text, format_status_text};
pub use sync::{
    format_debug_dump_text, format_pull_report_text, format_push_report_text,
    format_worker_stats,
};
pub use tree::{
    format_import_summary, format_listing_text, format_public_nodes_text, ImportSummary,
};
