//! Markdown report generation

use crate::output::summary::{CrawlSummary, OutputResult};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Maximum number of external references listed in a report
const MAX_EXTERNAL_LISTED: usize = 50;

/// Writes the markdown report for a run
pub fn generate_markdown_report(summary: &CrawlSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_report(summary);

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl summary as markdown
pub fn format_markdown_report(summary: &CrawlSummary) -> String {
    let mut md = String::new();

    md.push_str("# Crawl-Relay Report\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Seed**: {}\n", summary.seed));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", summary.finished_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Duration**: {} seconds\n",
        summary.duration_seconds()
    ));
    md.push_str(&format!("- **Status**: {}\n", summary.status));
    if let Some(hash) = &summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    if let Some(path) = &summary.resume_file {
        md.push_str(&format!("- **Resume File**: {}\n", path.display()));
    }
    md.push('\n');

    md.push_str("## Items\n\n");
    md.push_str("| Status | Count |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Fetched | {} |\n", summary.fetched));
    md.push_str(&format!("| Redirected | {} |\n", summary.redirected));
    md.push_str(&format!("| Failed | {} |\n", summary.failed));
    md.push_str(&format!("| Queued | {} |\n", summary.queued));
    md.push_str(&format!("| **Total** | {} |\n\n", summary.total_items));
    md.push_str(&format!(
        "Processed {} items, success rate {:.2}%.\n\n",
        summary.processed,
        summary.success_rate()
    ));

    if !summary.failures.is_empty() {
        md.push_str("## Failures\n\n");
        md.push_str("| Code | Count |\n");
        md.push_str("|------|-------|\n");
        for (code, count) in summary.failure_breakdown() {
            md.push_str(&format!("| {} | {} |\n", code, count));
        }
        md.push('\n');

        md.push_str("| Code | URL |\n");
        md.push_str("|------|-----|\n");
        for failure in &summary.failures {
            md.push_str(&format!("| {} | {} |\n", failure.code, failure.url));
        }
        md.push('\n');
    }

    if !summary.external_references.is_empty() {
        md.push_str("## External References\n\n");
        md.push_str(&format!(
            "Total: {}\n\n",
            summary.external_references.len()
        ));
        for url in summary.external_references.iter().take(MAX_EXTERNAL_LISTED) {
            md.push_str(&format!("- {}\n", url));
        }
        if summary.external_references.len() > MAX_EXTERNAL_LISTED {
            md.push_str(&format!(
                "\n... and {} more\n",
                summary.external_references.len() - MAX_EXTERNAL_LISTED
            ));
        }
        md.push('\n');
    }

    md
}
