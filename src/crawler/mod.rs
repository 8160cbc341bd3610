//! Crawler module for fetching and processing crawl items
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with a size limit and manual redirect handling
//! - Link extraction from HTML
//! - Dispatch throttling
//! - The per-item state transition table
//! - The engine that ties them together

mod engine;
mod fetcher;
mod parser;
mod scheduler;
mod transition;

pub use engine::{install_panic_hook, Engine, EngineSettings, SnapshotWriter};
pub use fetcher::{build_http_client, fetch_url, FetchOutcome, DEFAULT_USER_AGENT};
pub use parser::extract_links;
pub use scheduler::{DispatchSlot, Scheduler};
pub use transition::{plan, plan_disallowed, Effect, Transition};

use crate::state::{FetchStatus, QueueItem};

/// How a session should start
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartMode {
    /// Start from the seed URL
    Fresh,
    /// Continue from a resume snapshot
    Resume(Vec<QueueItem>),
}

/// Number of items in a snapshot that still need fetching
pub fn unfinished_count(items: &[QueueItem]) -> usize {
    items
        .iter()
        .filter(|item| matches!(item.status, FetchStatus::Queued | FetchStatus::Fetching))
        .count()
}

/// Decides whether to resume from a loaded snapshot
///
/// - `skip_resume` always starts fresh
/// - a snapshot with nothing left to fetch starts fresh
/// - otherwise `no_interaction` resumes without asking, and `confirm` is
///   asked with the number of unfinished items
pub fn choose_start(
    snapshot: Vec<QueueItem>,
    skip_resume: bool,
    no_interaction: bool,
    confirm: impl FnOnce(usize) -> bool,
) -> StartMode {
    if skip_resume {
        return StartMode::Fresh;
    }

    let unfinished = unfinished_count(&snapshot);
    if unfinished == 0 {
        return StartMode::Fresh;
    }

    if no_interaction || confirm(unfinished) {
        StartMode::Resume(snapshot)
    } else {
        StartMode::Fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Vec<QueueItem> {
        let mut done = QueueItem::parse("https://example.com/", None).unwrap();
        done.status = FetchStatus::Fetched;
        vec![done, QueueItem::parse("https://example.com/a", None).unwrap()]
    }

    #[test]
    fn test_skip_resume_wins() {
        let mode = choose_start(snapshot(), true, true, |_| true);
        assert_eq!(mode, StartMode::Fresh);
    }

    #[test]
    fn test_no_interaction_resumes() {
        let mode = choose_start(snapshot(), false, true, |_| panic!("must not prompt"));
        assert!(matches!(mode, StartMode::Resume(items) if items.len() == 2));
    }

    #[test]
    fn test_prompt_answer_is_respected() {
        let mut asked = None;
        let mode = choose_start(snapshot(), false, false, |n| {
            asked = Some(n);
            false
        });
        assert_eq!(mode, StartMode::Fresh);
        assert_eq!(asked, Some(1));
    }

    #[test]
    fn test_finished_snapshot_starts_fresh() {
        let mut items = snapshot();
        items.truncate(1);
        let mode = choose_start(items, false, false, |_| panic!("must not prompt"));
        assert_eq!(mode, StartMode::Fresh);
    }

    #[test]
    fn test_empty_snapshot_starts_fresh() {
        assert_eq!(choose_start(Vec::new(), false, true, |_| true), StartMode::Fresh);
    }
}
