//! Output module for end-of-run reporting
//!
//! This module handles:
//! - Collecting the end-of-run summary from a session
//! - Printing it to the console
//! - Writing an optional markdown report

mod markdown;
pub mod stats;
mod summary;

pub use markdown::{format_markdown_report, generate_markdown_report};
pub use stats::print_summary;
pub use summary::{CrawlSummary, OutputError, OutputResult, RunStatus};
