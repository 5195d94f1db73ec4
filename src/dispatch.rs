//! Two-tier concurrency limiting for channel and item work
//!
//! [`PermitPool`] bounds how many units of one kind of work run at once. The
//! [`Dispatcher`] owns two of them, one for channels being reconciled and one
//! for enqueue requests in flight, plus a [`TaskTracker`] covering every
//! preset firing so shutdown can wait for all outstanding work.

use crate::error::{Error, Result};
use crate::utils::cancellable;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// A named, fixed-size pool of permits
#[derive(Clone, Debug)]
pub struct PermitPool {
    name: &'static str,
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl PermitPool {
    /// Create a pool of `size` permits
    pub fn new(name: &'static str, size: usize) -> Self {
        Self {
            name,
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Pool name, used as log context
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Total number of permits
    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run `work` while holding one permit
    ///
    /// Waiting for the permit is abandoned with [`Error::Cancelled`] as soon
    /// as `cancel` fires; `work` is then never polled. The permit is released
    /// when `work` completes, whether it succeeded or failed.
    pub async fn with_permit<T, F>(&self, cancel: &CancellationToken, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = cancellable(cancel, async {
            self.semaphore
                .acquire()
                .await
                .map_err(|_| Error::Cancelled)
        })
        .await?;

        work.await
    }

    /// Wait until every permit is free again
    pub async fn drain(&self) {
        let all = u32::try_from(self.size).unwrap_or(u32::MAX);
        if let Ok(permits) = self.semaphore.acquire_many(all).await {
            drop(permits);
        }
        debug!(pool = self.name, "Permit pool drained");
    }
}

/// Channel and item permit pools plus the tracker for scheduled work
#[derive(Debug)]
pub struct Dispatcher {
    channels: PermitPool,
    items: PermitPool,
    tracker: TaskTracker,
}

impl Dispatcher {
    /// Create a dispatcher with the given channel and item limits
    pub fn new(channel_limit: usize, item_limit: usize) -> Self {
        Self {
            channels: PermitPool::new("channels", channel_limit),
            items: PermitPool::new("items", item_limit),
            tracker: TaskTracker::new(),
        }
    }

    /// Pool bounding channels reconciled at once
    pub fn channels(&self) -> &PermitPool {
        &self.channels
    }

    /// Pool bounding enqueue requests in flight
    pub fn items(&self) -> &PermitPool {
        &self.items
    }

    /// Spawn tracked work that [`Dispatcher::drain`] will wait for
    pub fn spawn<F>(&self, work: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(work)
    }

    /// Number of tracked tasks still running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every tracked task to finish and every permit to be returned
    pub async fn drain(&self) {
        self.tracker.close();
        debug!(in_flight = self.tracker.len(), "Waiting for dispatched work");
        self.tracker.wait().await;
        self.channels.drain().await;
        self.items.drain().await;
    }
}
