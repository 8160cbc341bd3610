//! Console output of the end-of-run summary

use crate::output::summary::{CrawlSummary, RunStatus};

/// Prints the summary to stdout
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== Crawl Summary ===\n");

    println!("Run:");
    println!("  Seed: {}", summary.seed);
    println!("  Status: {}", summary.status);
    println!("  Duration: {}s", summary.duration_seconds());
    if let Some(path) = &summary.resume_file {
        println!("  Resume file: {}", path.display());
    }
    println!();

    println!("Items:");
    println!("  Processed: {}", summary.processed);
    println!("  Known: {}", summary.total_items);
    println!("  Fetched: {}", summary.fetched);
    println!("  Redirected: {}", summary.redirected);
    println!("  Failed: {}", summary.failed);
    if summary.queued > 0 {
        println!("  Still queued: {}", summary.queued);
    }
    println!();

    if !summary.external_references.is_empty() {
        println!(
            "External references (not fetched): {}",
            summary.external_references.len()
        );
        println!();
    }

    if !summary.failures.is_empty() {
        println!("Failures ({}):", summary.failures.len());
        for failure in &summary.failures {
            println!("  {}", failure);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} fetched, {} redirected)",
        summary.success_rate(),
        summary.fetched,
        summary.redirected
    );

    if summary.status == RunStatus::Interrupted {
        println!("\nCrawl interrupted; run again to resume.");
    }
}
