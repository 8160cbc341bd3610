//! Dispatch throttling
//!
//! The scheduler hands out dispatch slots. A slot is granted when:
//! - fewer than `concurrency` fetches are in flight (global semaphore)
//! - at least `interval` has passed since the previous dispatch tick
//!
//! The interval throttles the dispatch loop, not individual items.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{interval, Interval, MissedTickBehavior};

/// A granted dispatch slot, released when the item's task ends
pub struct DispatchSlot {
    _permit: OwnedSemaphorePermit,
}

pub struct Scheduler {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    ticker: Option<Interval>,
}

impl Scheduler {
    /// Creates a scheduler
    ///
    /// A zero `concurrency` is treated as one; a zero `tick` disables the
    /// throttle.
    pub fn new(concurrency: usize, tick: Duration) -> Self {
        let concurrency = concurrency.max(1);
        let ticker = (!tick.is_zero()).then(|| {
            let mut ticker = interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            ticker,
        }
    }

    /// Waits for the next dispatch slot
    ///
    /// Returns `None` only if the scheduler has been closed.
    pub async fn next_slot(&mut self) -> Option<DispatchSlot> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.tick().await;
        }
        tracing::trace!("Dispatch slot granted ({} free)", self.available());
        Some(DispatchSlot { _permit: permit })
    }

    /// Number of fetches that could start right now
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Number of slots currently held
    pub fn in_flight(&self) -> usize {
        self.concurrency - self.available()
    }

    /// Stops granting slots
    pub fn close(&self) {
        self.semaphore.close();
    }
}
