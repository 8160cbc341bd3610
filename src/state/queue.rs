use crate::state::{FetchStatus, QueueItem};
use std::collections::{HashMap, VecDeque};

/// Index of an item inside a [`CrawlQueue`]
pub type ItemId = usize;

/// The crawl queue
///
/// Items are never removed: finished items stay so that a later snapshot can
/// tell a resumed run which URLs are already done. Dispatch order is FIFO over
/// the items still `queued`.
#[derive(Debug, Default)]
pub struct CrawlQueue {
    items: Vec<QueueItem>,
    seen: HashMap<String, ItemId>,
    pending: VecDeque<ItemId>,
}

impl CrawlQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a queue from a snapshot
    ///
    /// Items that were `fetching` when the snapshot was taken are put back to
    /// `queued`. Duplicate URLs keep their first occurrence.
    pub fn from_items(items: Vec<QueueItem>) -> Self {
        let mut queue = Self::new();
        for mut item in items {
            item.requeue_interrupted();
            queue.push(item);
        }
        queue
    }

    /// Appends an item unless its URL is already known
    ///
    /// Returns the new item's id, or `None` for a duplicate.
    pub fn push(&mut self, item: QueueItem) -> Option<ItemId> {
        if self.seen.contains_key(&item.url) {
            return None;
        }

        let id = self.items.len();
        self.seen.insert(item.url.clone(), id);
        if item.status == FetchStatus::Queued {
            self.pending.push_back(id);
        }
        self.items.push(item);
        Some(id)
    }

    /// Returns true if the URL has been queued before
    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains_key(url)
    }

    /// Looks up an item by URL
    pub fn find(&self, url: &str) -> Option<&QueueItem> {
        self.seen.get(url).and_then(|&id| self.items.get(id))
    }

    /// Takes the next queued item, marking it `fetching`
    ///
    /// Returns a copy of the item so the caller can work on it without
    /// holding the queue.
    pub fn next_queued(&mut self) -> Option<(ItemId, QueueItem)> {
        while let Some(id) = self.pending.pop_front() {
            let item = &mut self.items[id];
            if item.advance(FetchStatus::Fetching).is_ok() {
                return Some((id, item.clone()));
            }
        }
        None
    }

    pub fn get(&self, id: ItemId) -> Option<&QueueItem> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut QueueItem> {
        self.items.get_mut(id)
    }

    /// Marks every `fetching` item as `failed`
    ///
    /// Used when a run finishes with items whose task never reported back.
    /// Returns the URLs of the items that were failed.
    pub fn fail_in_flight(&mut self) -> Vec<String> {
        self.items
            .iter_mut()
            .filter(|item| item.status == FetchStatus::Fetching)
            .filter_map(|item| item.advance(FetchStatus::Failed).ok().map(|_| item.url.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items waiting to be dispatched
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn count_by_status(&self, status: FetchStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    /// Copies every item for persistence
    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.items.clone()
    }
}
