//! The crawl engine
//!
//! Drives the queue to completion: a dispatch loop hands queued items to
//! tasks under the scheduler's concurrency and interval limits, and each task
//! runs fetch, detect, filter and publish for its item in order. Tasks share
//! the [`CrawlSession`], so discoveries from concurrent completions land in
//! one queue.
//!
//! The loop stops when nothing is queued or in flight, or when the
//! cancellation token fires. On completion a final snapshot is written; on
//! cancellation in-flight tasks are aborted and the snapshot records their
//! items as `queued`.

use crate::crawler::fetcher::{build_http_client, fetch_url, FetchOutcome, DEFAULT_USER_AGENT};
use crate::crawler::parser::extract_links;
use crate::crawler::scheduler::{DispatchSlot, Scheduler};
use crate::crawler::transition::{plan, plan_disallowed, Effect, Transition};
use crate::detect::DetectorRegistry;
use crate::filter::{FilterContext, FilterRegistry, RunArgs, REWRITE_OPTION};
use crate::output::{CrawlSummary, RunStatus};
use crate::publish::{PublishError, Publisher};
use crate::redirect::resolve_redirect;
use crate::robots::RobotsCache;
use crate::state::{
    CrawlSession, Enqueued, FailureCode, ItemId, QueueItem, ResponseMeta, SessionSettings,
};
use crate::storage::{ResumeStore, StateStore};
use crate::url::{parse_crawl_url, resolve_reference, Whitelist};
use crate::RelayError;
use reqwest::Client;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Log progress every this many processed items
const PROGRESS_EVERY: usize = 25;

/// How often a forced exit checks whether a state write has finished
const WRITE_POLL: Duration = Duration::from_millis(20);

/// Response headers forwarded with published files
const PRESERVED_HEADERS: &[&str] = &["content-type", "content-disposition"];

/// Run-wide engine options
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub session: SessionSettings,

    /// Enable the relative-domain filter
    pub rewrite: bool,

    /// Ask the publisher to look for attachments in markup
    pub attachments: bool,

    /// Comma-separated extra domains for the relative-domain filter
    pub extra_domains: String,

    /// Publish artifacts as live rather than draft
    pub published: bool,

    pub user_agent: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            session: SessionSettings::default(),
            rewrite: false,
            attachments: false,
            extra_domains: String::new(),
            published: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl EngineSettings {
    fn run_args(&self) -> RunArgs {
        let args = RunArgs::new().with_extra_domains(self.extra_domains.clone());
        if self.rewrite {
            args.enable(REWRITE_OPTION)
        } else {
            args
        }
    }
}

/// Writes resume snapshots of a session
///
/// Writes are synchronous and guarded by the session's write flag, so
/// overlapping shutdown paths never write the file twice at once.
#[derive(Clone)]
pub struct SnapshotWriter {
    session: Arc<CrawlSession>,
    store: ResumeStore,
    filename: String,
}

impl SnapshotWriter {
    /// Persists the queue with in-flight items reset to `queued`
    ///
    /// Best effort: errors are logged and `None` is returned.
    pub fn write_interrupted(&self) -> Option<PathBuf> {
        self.write(self.session.interrupted_snapshot())
    }

    /// Like [`write_interrupted`](Self::write_interrupted), but never waits on
    /// the queue lock
    pub fn try_write_interrupted(&self) -> Option<PathBuf> {
        self.session
            .try_interrupted_snapshot()
            .and_then(|items| self.write(items))
    }

    /// Waits out a write in progress, then persists the interrupted queue
    ///
    /// Used on a forced exit, where the run loop never reaches its own write.
    pub async fn flush_interrupted(&self) -> Option<PathBuf> {
        while self.session.write_in_progress() {
            tokio::time::sleep(WRITE_POLL).await;
        }
        self.try_write_interrupted()
    }

    /// Persists the queue as it is
    pub fn write_final(&self) -> Option<PathBuf> {
        self.write(self.session.snapshot())
    }

    fn write(&self, items: Vec<QueueItem>) -> Option<PathBuf> {
        let Some(_guard) = self.session.try_begin_write() else {
            tracing::debug!("Resume state write already in progress, skipping");
            return None;
        };

        match self.store.write(&items, &self.filename) {
            Ok(path) => {
                tracing::info!("Saved {} items to {}", items.len(), path.display());
                Some(path)
            }
            Err(e) => {
                tracing::error!("Failed to save resume state: {}", e);
                None
            }
        }
    }
}

/// Writes an interrupted snapshot before the default panic output
///
/// Covers crashes that never reach the engine's own shutdown path.
pub fn install_panic_hook(writer: SnapshotWriter) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        writer.try_write_interrupted();
        previous(info);
    }));
}

/// Everything an item task needs, shared behind an `Arc`
struct ItemContext {
    session: Arc<CrawlSession>,
    client: Client,
    publisher: Arc<dyn Publisher>,
    detectors: DetectorRegistry,
    filters: FilterRegistry,
    run_args: RunArgs,
    robots: Option<RobotsCache>,
    settings: EngineSettings,
}

/// The crawl engine
pub struct Engine {
    context: Arc<ItemContext>,
    writer: SnapshotWriter,
    seed: Url,
}

impl Engine {
    /// Creates an engine for the site of `seed`
    ///
    /// The whitelist is the seed's host plus its `www.` counterpart. Resume
    /// snapshots go to `filename` inside `store`.
    pub fn new(
        seed: Url,
        settings: EngineSettings,
        publisher: Arc<dyn Publisher>,
        store: ResumeStore,
        filename: impl Into<String>,
    ) -> Result<Self, RelayError> {
        let whitelist = Whitelist::from_url(&seed)?;
        let session = Arc::new(CrawlSession::new(whitelist, settings.session.clone()));
        let client = build_http_client(&settings.user_agent, settings.session.accept_cookies)?;
        let robots = settings
            .session
            .respect_robots
            .then(|| RobotsCache::new(settings.user_agent.clone()));

        let context = ItemContext {
            session: Arc::clone(&session),
            client,
            publisher,
            detectors: DetectorRegistry::standard()?,
            filters: FilterRegistry::standard(),
            run_args: settings.run_args(),
            robots,
            settings,
        };

        Ok(Self {
            context: Arc::new(context),
            writer: SnapshotWriter {
                session,
                store,
                filename: filename.into(),
            },
            seed,
        })
    }

    pub fn session(&self) -> &Arc<CrawlSession> {
        &self.context.session
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }

    /// Returns a writer that can snapshot this engine's session from anywhere
    pub fn snapshot_writer(&self) -> SnapshotWriter {
        self.writer.clone()
    }

    /// Queues the seed URL
    pub fn seed_queue(&self) -> Enqueued {
        self.context.session.enqueue(&self.seed, None)
    }

    /// Queues explicit URLs, such as the contents of a URL list file
    ///
    /// Invalid URLs are skipped with a warning. Returns how many were queued.
    pub fn inject(&self, urls: &[String]) -> usize {
        let mut queued = 0;
        for raw in urls {
            match parse_crawl_url(raw) {
                Ok(url) => {
                    if let Enqueued::Queued(_) = self.context.session.enqueue(&url, None) {
                        queued += 1;
                    }
                }
                Err(e) => tracing::warn!("Skipping injected URL {}: {}", raw, e),
            }
        }
        tracing::info!("Injected {} of {} URLs", queued, urls.len());
        queued
    }

    /// Replaces the queue with a resumed snapshot
    pub fn restore(&self, items: Vec<QueueItem>) {
        self.context.session.restore(items);
    }

    /// Runs the crawl until the queue is exhausted or `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) -> CrawlSummary {
        let session = &self.context.session;
        let settings = session.settings();
        tracing::info!(
            "Starting crawl of {} ({} items known, concurrency {}, interval {:?})",
            self.seed,
            session.queue_len(),
            settings.concurrency,
            settings.interval
        );

        let mut scheduler = Scheduler::new(settings.concurrency, settings.interval);
        let mut tasks: JoinSet<()> = JoinSet::new();

        let status = loop {
            while let Some(joined) = tasks.try_join_next() {
                log_join(joined);
            }

            if session.nothing_pending() {
                if tasks.is_empty() {
                    break RunStatus::Completed;
                }
                // Items queued by a running task are dispatched before it ends
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break RunStatus::Interrupted,
                    Some(joined) = tasks.join_next() => log_join(joined),
                    _ = session.work_queued() => {}
                }
                continue;
            }

            let slot = tokio::select! {
                biased;
                _ = cancel.cancelled() => break RunStatus::Interrupted,
                slot = scheduler.next_slot() => slot,
            };
            let Some(slot) = slot else {
                break RunStatus::Interrupted;
            };
            let Some((id, item)) = session.next_item() else {
                continue;
            };

            tracing::trace!("Dispatching {}", item.url);
            let context = Arc::clone(&self.context);
            tasks.spawn(async move { context.process(id, item, slot).await });
        };

        scheduler.close();
        let resume_file = match status {
            RunStatus::Interrupted => {
                tracing::warn!("Crawl interrupted, stopping {} in-flight items", tasks.len());
                tasks.abort_all();
                while let Some(joined) = tasks.join_next().await {
                    log_join(joined);
                }
                self.writer.write_interrupted()
            }
            RunStatus::Completed => {
                let abandoned = session.abandon_in_flight();
                if abandoned > 0 {
                    tracing::warn!("{} items ended without completing", abandoned);
                }
                None
            }
        };

        let swept = session.sweep_temp_files();
        if swept > 0 {
            tracing::debug!("Swept {} temporary files", swept);
        }

        let resume_file = match status {
            RunStatus::Completed => self.writer.write_final(),
            RunStatus::Interrupted => resume_file,
        };

        let mut summary = CrawlSummary::from_session(session, status).with_seed(self.seed.as_str());
        summary.temp_files_swept = swept;
        summary.resume_file = resume_file;
        tracing::info!(
            "Crawl {}: {} processed, {} failures",
            status,
            summary.processed,
            summary.failures.len()
        );
        summary
    }
}

fn log_join(joined: Result<(), JoinError>) {
    match joined {
        Ok(()) => {}
        Err(e) if e.is_panic() => tracing::error!("Item task panicked: {}", e),
        Err(_) => tracing::trace!("Item task cancelled"),
    }
}

impl ItemContext {
    /// Runs one item from `fetching` to its terminal status
    async fn process(&self, id: ItemId, item: QueueItem, slot: DispatchSlot) {
        let _slot = slot;

        if self.disallowed(&item).await {
            tracing::debug!("Disallowed by robots.txt: {}", item.url);
            self.complete(id, &item, plan_disallowed(), None).await;
        } else {
            let outcome = fetch_url(
                &self.client,
                &item.url,
                self.session.settings().max_resource_size,
            )
            .await;
            let transition = plan(&outcome, &self.detectors);
            self.complete(id, &item, transition, Some(outcome)).await;
        }

        let processed = self.session.record_processed();
        if processed % PROGRESS_EVERY == 0 {
            tracing::info!(
                "Progress: {} processed, {} known, {} failures",
                processed,
                self.session.queue_len(),
                self.session.failures().len()
            );
        }
    }

    async fn disallowed(&self, item: &QueueItem) -> bool {
        match &self.robots {
            Some(robots) => {
                !robots
                    .is_allowed(&self.client, &item.protocol, &item.host, &item.url)
                    .await
            }
            None => false,
        }
    }

    /// Records the transition, then carries out its effects in order
    async fn complete(
        &self,
        id: ItemId,
        item: &QueueItem,
        transition: Transition,
        outcome: Option<FetchOutcome>,
    ) {
        let (meta, body) = match outcome {
            Some(FetchOutcome::Fetched { meta, body }) => (Some(meta), Some(body)),
            Some(FetchOutcome::Redirected { meta, .. }) => (Some(meta), None),
            _ => (None, None),
        };

        if let Err(e) = self
            .session
            .complete_item(id, transition.status, meta.clone())
        {
            tracing::warn!("Could not complete {}: {}", item.url, e);
            return;
        }
        tracing::debug!("{} {}", transition.status, item.url);

        let mut current = item.clone();
        current.status = transition.status;
        current.response = meta;

        let page_url = match current.parsed_url() {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Stored URL {} no longer parses: {}", current.url, e);
                return;
            }
        };
        let text = body.as_deref().map(String::from_utf8_lossy);

        for effect in transition.effects {
            match effect {
                Effect::Detect => {
                    if let (Some(meta), Some(text)) = (&current.response, &text) {
                        self.detect(&current, &page_url, meta, text);
                    }
                }
                Effect::ExtractLinks => {
                    if let Some(text) = &text {
                        let links = extract_links(text, &page_url);
                        self.discover(&current, links);
                    }
                }
                Effect::PublishMarkup => {
                    if let Some(text) = &text {
                        self.publish_markup(&current, text.to_string()).await;
                    }
                }
                Effect::PublishFile => {
                    if let (Some(meta), Some(body)) = (&current.response, &body) {
                        self.publish_file(&current, meta, body).await;
                    }
                }
                Effect::ResolveRedirect { location } => {
                    self.follow_redirect(&current, &page_url, &location).await;
                }
                Effect::RecordFailure(code) => {
                    self.session.record_failure(code, &current.url);
                }
            }
        }
    }

    fn detect(&self, item: &QueueItem, page_url: &Url, meta: &ResponseMeta, text: &str) {
        let found = self
            .detectors
            .run(meta, text, Some(&item.host), &item.protocol);
        let urls = found
            .iter()
            .filter_map(|reference| resolve_reference(page_url, reference));
        self.discover(item, urls);
    }

    /// Offers discovered URLs to the queue with `item` as referrer
    fn discover(&self, item: &QueueItem, urls: impl IntoIterator<Item = Url>) {
        let mut queued = 0;
        for url in urls {
            if let Enqueued::Queued(_) = self.session.enqueue(&url, Some(&item.url)) {
                queued += 1;
            }
        }
        if queued > 0 {
            tracing::debug!("{} new items from {}", queued, item.url);
        }
    }

    async fn publish_markup(&self, item: &QueueItem, content: String) {
        let context = FilterContext {
            host: item.hostname(),
            url: &item.url,
        };
        let content = self.filters.run(content, &context, &self.run_args);

        let result = self
            .publisher
            .markup(
                &content,
                &item.path,
                self.settings.published,
                self.settings.attachments,
            )
            .await;
        if let Err(e) = result {
            self.publish_failed(item, e);
        }
    }

    async fn publish_file(&self, item: &QueueItem, meta: &ResponseMeta, body: &[u8]) {
        let path = match self.spool(body).await {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Could not buffer {}: {}", item.url, e);
                self.session.record_failure(FailureCode::Publish, &item.url);
                return;
            }
        };

        let headers: BTreeMap<String, String> = PRESERVED_HEADERS
            .iter()
            .filter_map(|name| meta.header(name).map(|v| (name.to_string(), v.to_string())))
            .collect();

        let result = self
            .publisher
            .file(&path, &item.path, self.settings.published, &headers)
            .await;
        self.session.release_temp_file(&path);
        if let Err(e) = result {
            self.publish_failed(item, e);
        }
    }

    /// Writes a body to a tracked temporary file
    async fn spool(&self, body: &[u8]) -> Result<PathBuf, RelayError> {
        let path = tempfile::Builder::new()
            .prefix("crawl-relay-")
            .tempfile()?
            .into_temp_path()
            .keep()
            .map_err(|e| e.error)?;
        self.session.register_temp_file(&path);

        if let Err(e) = tokio::fs::write(&path, body).await {
            self.session.release_temp_file(&path);
            return Err(e.into());
        }
        Ok(path)
    }

    async fn follow_redirect(&self, item: &QueueItem, page_url: &Url, location: &str) {
        let Some(destination_url) = resolve_reference(page_url, location) else {
            tracing::warn!("Ignoring redirect from {} to {:?}", item.url, location);
            return;
        };

        // A destination crawled earlier carries its observed status
        let destination = match self.session.item_by_url(destination_url.as_str()) {
            Some(known) => known,
            None => match QueueItem::new(&destination_url, Some(&item.url)) {
                Ok(fresh) => fresh,
                Err(e) => {
                    tracing::warn!("Ignoring redirect to {}: {}", destination_url, e);
                    return;
                }
            },
        };

        if let Some(record) = resolve_redirect(item, &destination) {
            let result = self
                .publisher
                .redirect(&record.from, &record.to, &record.author, record.status_code)
                .await;
            if let Err(e) = result {
                self.publish_failed(item, e);
            }
        }

        self.session.enqueue(&destination_url, Some(&item.url));
    }

    fn publish_failed(&self, item: &QueueItem, e: PublishError) {
        tracing::warn!("Publish failed for {}: {}", item.url, e);
        self.session.record_failure(FailureCode::Publish, &item.url);
    }
}
