//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `QueueItem` / `FetchStatus`: one crawl task and where it is in its lifecycle
//! - `CrawlQueue`: the de-duplicated, FIFO-dispatched set of items
//! - `CrawlSession`: run-wide context (whitelist, limits, counters, failures, temp files)
//! - `CrawlFailure`: `{code, url}` records for the end-of-run report

mod failure;
mod queue;
mod queue_item;
mod session;

// Re-export main types
pub use failure::{CrawlFailure, FailureCode};
pub use queue::{CrawlQueue, ItemId};
pub use queue_item::{FetchStatus, QueueItem, ResponseMeta};
pub use session::{
    CrawlSession, Enqueued, SessionSettings, WriteGuard, DEFAULT_CONCURRENCY,
    DEFAULT_INTERVAL_MS, DEFAULT_MAX_RESOURCE_SIZE,
};
