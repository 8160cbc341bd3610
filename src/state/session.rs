//! The run-wide crawl context
//!
//! A [`CrawlSession`] is owned by the engine for the lifetime of a run and is
//! shared with item tasks behind an `Arc`. All mutable state sits behind
//! short-lived locks so discoveries from concurrent completions can be
//! appended safely.

use crate::state::failure::{CrawlFailure, FailureCode};
use crate::state::queue::{CrawlQueue, ItemId};
use crate::state::{FetchStatus, QueueItem, ResponseMeta};
use crate::url::Whitelist;
use crate::RelayError;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Duration;
use tokio::sync::Notify;
use url::Url;

/// Default number of concurrent fetches
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default delay between dispatch ticks
pub const DEFAULT_INTERVAL_MS: u64 = 200;

/// Default maximum resource size (256 MiB)
pub const DEFAULT_MAX_RESOURCE_SIZE: u64 = 268_435_456;

/// Limits and toggles fixed for the duration of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Maximum number of fetches in flight
    pub concurrency: usize,

    /// Minimum delay between dispatch ticks
    pub interval: Duration,

    /// Bodies larger than this are dropped
    pub max_resource_size: u64,

    /// Honour robots.txt
    pub respect_robots: bool,

    /// Keep cookies between requests
    pub accept_cookies: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            max_resource_size: DEFAULT_MAX_RESOURCE_SIZE,
            respect_robots: false,
            accept_cookies: false,
        }
    }
}

/// Result of offering a URL to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// A new item was queued
    Queued(ItemId),
    /// The URL was already known
    Duplicate,
    /// The host is outside the whitelist; recorded, never fetched
    External,
    /// The URL cannot be crawled, such as a non-HTTP scheme
    Invalid,
}

/// Clears the in-progress flag when a state write finishes
pub struct WriteGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Run-wide crawl context
pub struct CrawlSession {
    whitelist: Whitelist,
    settings: SessionSettings,
    queue: Mutex<CrawlQueue>,
    failures: Mutex<Vec<CrawlFailure>>,
    external: Mutex<BTreeSet<String>>,
    temp_files: Mutex<HashSet<PathBuf>>,
    processed: AtomicUsize,
    writing: AtomicBool,
    work: Notify,
    started_at: DateTime<Utc>,
}

/// Resets the in-flight items of a queue copy
fn requeue_copy(mut items: Vec<QueueItem>) -> Vec<QueueItem> {
    let reset = items
        .iter_mut()
        .map(QueueItem::requeue_interrupted)
        .filter(|reset| *reset)
        .count();
    if reset > 0 {
        tracing::info!("Re-queued {} in-flight items", reset);
    }
    items
}

/// Locks a mutex, recovering the data if a panicking task poisoned it
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CrawlSession {
    pub fn new(whitelist: Whitelist, settings: SessionSettings) -> Self {
        Self {
            whitelist,
            settings,
            queue: Mutex::new(CrawlQueue::new()),
            failures: Mutex::new(Vec::new()),
            external: Mutex::new(BTreeSet::new()),
            temp_files: Mutex::new(HashSet::new()),
            processed: AtomicUsize::new(0),
            writing: AtomicBool::new(false),
            work: Notify::new(),
            started_at: Utc::now(),
        }
    }

    /// Replaces the queue with items loaded from a resume file
    pub fn restore(&self, items: Vec<QueueItem>) {
        let queue = CrawlQueue::from_items(items);
        tracing::info!(
            "Restored {} items ({} still to fetch)",
            queue.len(),
            queue.pending_len()
        );
        *lock(&self.queue) = queue;
        self.work.notify_one();
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Offers a discovered URL to the queue
    ///
    /// URLs outside the whitelist are recorded as external references and
    /// never queued.
    pub fn enqueue(&self, url: &Url, referrer: Option<&str>) -> Enqueued {
        if !self.whitelist.allows(url) {
            let mut external = url.clone();
            external.set_fragment(None);
            lock(&self.external).insert(external.to_string());
            return Enqueued::External;
        }

        let item = match QueueItem::new(url, referrer) {
            Ok(item) => item,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", url, e);
                return Enqueued::Invalid;
            }
        };

        match lock(&self.queue).push(item) {
            Some(id) => {
                tracing::trace!("Queued {} (referrer: {:?})", url, referrer);
                self.work.notify_one();
                Enqueued::Queued(id)
            }
            None => Enqueued::Duplicate,
        }
    }

    /// Takes the next queued item for dispatch
    pub fn next_item(&self) -> Option<(ItemId, QueueItem)> {
        lock(&self.queue).next_queued()
    }

    /// Returns true if nothing is waiting to be dispatched
    pub fn nothing_pending(&self) -> bool {
        lock(&self.queue).pending_len() == 0
    }

    /// Resolves once an item has been queued since the last wake-up
    ///
    /// A wake-up that happens while nobody waits is kept, so an item queued
    /// between a `nothing_pending` check and this call is not missed.
    pub async fn work_queued(&self) {
        self.work.notified().await;
    }

    /// Moves an item to a terminal status and records its response
    pub fn complete_item(
        &self,
        id: ItemId,
        status: FetchStatus,
        response: Option<ResponseMeta>,
    ) -> Result<(), RelayError> {
        let mut queue = lock(&self.queue);
        if let Some(item) = queue.get_mut(id) {
            item.advance(status)?;
            if response.is_some() {
                item.response = response;
            }
        }
        Ok(())
    }

    /// Returns a copy of an item
    pub fn item(&self, id: ItemId) -> Option<QueueItem> {
        lock(&self.queue).get(id).cloned()
    }

    /// Returns a copy of the item with this URL, if it was ever queued
    pub fn item_by_url(&self, url: &str) -> Option<QueueItem> {
        lock(&self.queue).find(url).cloned()
    }

    pub fn record_failure(&self, code: FailureCode, url: &str) {
        tracing::debug!("Failure [{}] {}", code, url);
        lock(&self.failures).push(CrawlFailure::new(code, url));
    }

    pub fn failures(&self) -> Vec<CrawlFailure> {
        lock(&self.failures).clone()
    }

    pub fn external_references(&self) -> Vec<String> {
        lock(&self.external).iter().cloned().collect()
    }

    /// Counts an item whose processing finished, whatever the outcome
    pub fn record_processed(&self) -> usize {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn count_by_status(&self, status: FetchStatus) -> usize {
        lock(&self.queue).count_by_status(status)
    }

    pub fn queue_len(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Tracks a temporary file so it can be swept at session end
    pub fn register_temp_file(&self, path: &Path) {
        lock(&self.temp_files).insert(path.to_path_buf());
    }

    /// Deletes a tracked temporary file
    ///
    /// Deletion failures are logged and otherwise ignored.
    pub fn release_temp_file(&self, path: &Path) {
        lock(&self.temp_files).remove(path);
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!("Failed to delete temp file {}: {}", path.display(), e);
            }
        }
    }

    /// Deletes every temporary file still tracked
    ///
    /// Returns how many files were swept.
    pub fn sweep_temp_files(&self) -> usize {
        let paths: Vec<PathBuf> = lock(&self.temp_files).drain().collect();
        for path in &paths {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::debug!("Failed to sweep temp file {}: {}", path.display(), e);
            }
        }
        paths.len()
    }

    /// Fails items whose task ended without completing them
    ///
    /// Each one is recorded as an aborted failure. Returns how many there were.
    pub fn abandon_in_flight(&self) -> usize {
        let urls = lock(&self.queue).fail_in_flight();
        for url in &urls {
            self.record_failure(FailureCode::Aborted, url);
        }
        urls.len()
    }

    /// Copies the queue for persistence
    pub fn snapshot(&self) -> Vec<QueueItem> {
        lock(&self.queue).snapshot()
    }

    /// Copies the queue with in-flight items reset to `queued`
    ///
    /// Used on shutdown so an item that was never fetched is retried by the
    /// next run. The live queue is left untouched.
    pub fn interrupted_snapshot(&self) -> Vec<QueueItem> {
        requeue_copy(self.snapshot())
    }

    /// Like [`interrupted_snapshot`](Self::interrupted_snapshot), but gives
    /// up instead of waiting if the queue is locked
    ///
    /// Panic hooks use this, since the panicking thread may hold the lock.
    pub fn try_interrupted_snapshot(&self) -> Option<Vec<QueueItem>> {
        let items = match self.queue.try_lock() {
            Ok(queue) => queue.snapshot(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().snapshot(),
            Err(TryLockError::WouldBlock) => return None,
        };
        Some(requeue_copy(items))
    }

    /// Claims the state-write slot
    ///
    /// Returns `None` if another write is already in progress.
    /// Returns true while a state write holds the guard
    pub fn write_in_progress(&self) -> bool {
        self.writing.load(Ordering::Acquire)
    }

    pub fn try_begin_write(&self) -> Option<WriteGuard<'_>> {
        self.writing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| WriteGuard {
                flag: &self.writing,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CrawlSession {
        CrawlSession::new(Whitelist::new("example.com"), SessionSettings::default())
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_default_settings() {
        let settings = SessionSettings::default();
        assert_eq!(settings.concurrency, 4);
        assert_eq!(settings.interval, Duration::from_millis(200));
        assert_eq!(settings.max_resource_size, 268_435_456);
        assert!(!settings.respect_robots);
        assert!(!settings.accept_cookies);
    }

    #[test]
    fn test_enqueue_whitelisted() {
        let session = session();
        assert_eq!(
            session.enqueue(&url("https://example.com/a"), None),
            Enqueued::Queued(0)
        );
        assert_eq!(
            session.enqueue(&url("https://www.example.com/b"), None),
            Enqueued::Queued(1)
        );
        assert_eq!(
            session.enqueue(&url("https://example.com/a"), None),
            Enqueued::Duplicate
        );
    }

    #[tokio::test]
    async fn test_enqueue_wakes_dispatcher() {
        let session = session();
        session.enqueue(&url("https://example.com/a"), None);
        let woken = tokio::time::timeout(Duration::from_secs(1), session.work_queued()).await;
        assert!(woken.is_ok());

        // A duplicate queues nothing and wakes nobody
        session.enqueue(&url("https://example.com/a"), None);
        let woken = tokio::time::timeout(Duration::from_millis(50), session.work_queued()).await;
        assert!(woken.is_err());
    }

    #[test]
    fn test_enqueue_uncrawlable_scheme_is_invalid() {
        let session = session();
        assert_eq!(
            session.enqueue(&url("ftp://example.com/file.zip"), None),
            Enqueued::Invalid
        );
        assert_eq!(session.queue_len(), 0);
        assert!(session.external_references().is_empty());
    }

    #[test]
    fn test_enqueue_external_is_recorded_not_queued() {
        let session = session();
        assert_eq!(
            session.enqueue(&url("https://other.com/x"), Some("https://example.com/")),
            Enqueued::External
        );
        assert_eq!(session.queue_len(), 0);
        assert_eq!(session.external_references(), vec!["https://other.com/x"]);
    }

    #[test]
    fn test_complete_item_records_response() {
        let session = session();
        session.enqueue(&url("https://example.com/"), None);
        let (id, _) = session.next_item().unwrap();

        let meta = ResponseMeta {
            status_code: 200,
            ..Default::default()
        };
        session
            .complete_item(id, FetchStatus::Fetched, Some(meta))
            .unwrap();

        let item = session.item(id).unwrap();
        assert_eq!(item.status, FetchStatus::Fetched);
        assert_eq!(item.status_code(), Some(200));
    }

    #[test]
    fn test_interrupted_snapshot_requeues() {
        let session = session();
        session.enqueue(&url("https://example.com/"), None);
        session.next_item().unwrap();

        let snapshot = session.interrupted_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].status, FetchStatus::Queued);
        assert_eq!(session.count_by_status(FetchStatus::Fetching), 1);
    }

    #[test]
    fn test_write_guard_is_exclusive() {
        let session = session();
        let guard = session.try_begin_write();
        assert!(guard.is_some());
        assert!(session.try_begin_write().is_none());
        drop(guard);
        assert!(session.try_begin_write().is_some());
    }

    #[test]
    fn test_sweep_temp_files() {
        let session = session();
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.into_temp_path().keep().unwrap();

        session.register_temp_file(&path);
        assert_eq!(session.sweep_temp_files(), 1);
        assert!(!path.exists());
        assert_eq!(session.sweep_temp_files(), 0);
    }

    #[test]
    fn test_failures_accumulate() {
        let session = session();
        session.record_failure(FailureCode::Http(500), "https://example.com/a");
        session.record_failure(FailureCode::Publish, "https://example.com/b");
        assert_eq!(session.failures().len(), 2);
    }
}
