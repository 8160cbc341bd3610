//! End-of-run summary types

use crate::state::{CrawlFailure, CrawlSession, FetchStatus};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing reports
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The queue was exhausted
    Completed,
    /// A shutdown signal stopped the run
    Interrupted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Interrupted => f.write_str("interrupted"),
        }
    }
}

/// Summary statistics for a crawl
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    // Run metadata
    pub status: RunStatus,
    pub seed: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config_hash: Option<String>,
    pub resume_file: Option<PathBuf>,

    // Item counts
    pub processed: usize,
    pub total_items: usize,
    pub queued: usize,
    pub fetched: usize,
    pub failed: usize,
    pub redirected: usize,

    pub failures: Vec<CrawlFailure>,

    // Hosts outside the whitelist that were referenced but never fetched
    pub external_references: Vec<String>,

    pub temp_files_swept: usize,
}

impl CrawlSummary {
    /// Collects the counters of a finished session
    pub fn from_session(session: &CrawlSession, status: RunStatus) -> Self {
        // Interrupted in-flight items are persisted as queued
        let queued = session.count_by_status(FetchStatus::Queued)
            + match status {
                RunStatus::Interrupted => session.count_by_status(FetchStatus::Fetching),
                RunStatus::Completed => 0,
            };

        Self {
            status,
            seed: format!("https://{}/", session.whitelist().primary()),
            started_at: session.started_at(),
            finished_at: Utc::now(),
            config_hash: None,
            resume_file: None,
            processed: session.processed(),
            total_items: session.queue_len(),
            queued,
            fetched: session.count_by_status(FetchStatus::Fetched),
            failed: session.count_by_status(FetchStatus::Failed),
            redirected: session.count_by_status(FetchStatus::Redirected),
            failures: session.failures(),
            external_references: session.external_references(),
            temp_files_swept: 0,
        }
    }

    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = seed.into();
        self
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds().max(0)
    }

    /// Failure counts keyed by failure code
    pub fn failure_breakdown(&self) -> BTreeMap<String, usize> {
        let mut breakdown = BTreeMap::new();
        for failure in &self.failures {
            *breakdown.entry(failure.code.to_string()).or_insert(0) += 1;
        }
        breakdown
    }

    /// Percentage of finished items that were fetched or redirected
    pub fn success_rate(&self) -> f64 {
        let finished = self.fetched + self.failed + self.redirected;
        if finished == 0 {
            return 0.0;
        }
        (self.fetched + self.redirected) as f64 / finished as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FailureCode, SessionSettings};
    use crate::url::Whitelist;
    use url::Url;

    #[test]
    fn test_from_session() {
        let session = CrawlSession::new(Whitelist::new("example.com"), SessionSettings::default());
        session.enqueue(&Url::parse("https://example.com/").unwrap(), None);
        session.enqueue(&Url::parse("https://example.com/a").unwrap(), None);
        session.enqueue(&Url::parse("https://other.com/").unwrap(), None);

        let (id, _) = session.next_item().unwrap();
        session.complete_item(id, FetchStatus::Failed, None).unwrap();
        session.record_failure(FailureCode::Http(404), "https://example.com/");
        session.record_processed();

        let summary = CrawlSummary::from_session(&session, RunStatus::Completed);
        assert_eq!(summary.seed, "https://example.com/");
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.queued, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.external_references, vec!["https://other.com/"]);
        assert_eq!(summary.failure_breakdown().get("404"), Some(&1));
        assert_eq!(summary.success_rate(), 0.0);
    }

    #[test]
    fn test_interrupted_counts_in_flight_as_queued() {
        let session = CrawlSession::new(Whitelist::new("example.com"), SessionSettings::default());
        session.enqueue(&Url::parse("https://example.com/").unwrap(), None);
        session.next_item().unwrap();

        let summary = CrawlSummary::from_session(&session, RunStatus::Interrupted);
        assert_eq!(summary.queued, 1);
    }
}
