//! Staging live events into commits.
//!
//! A transaction subscribes a [`Stager`] to a rill. The stager records every
//! new event and counts how many settled as succeeded or failed. `commit`
//! detaches it, waits until every staged event has settled, and appends the
//! batch to a store as one [`Commit`]. After a successful commit the stager
//! is cleared and re-attached for the next batch.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rill_events::{Commit, Event, EventId, RillReference, RillStore};
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::config::RillConfig;
use crate::consumer::{AsyncRillConsumer, RillConsumer};
use crate::error::{RillError, TransactionError};
use crate::rills::{AsyncRill, SyncRill};
use crate::subscription::Subscription;

// ---------------------------------------------------------------------------
// StagingSource
// ---------------------------------------------------------------------------

/// A rill a transaction can stage events from.
#[async_trait]
pub trait StagingSource<T: Send + Sync + 'static>: Send + Sync {
    fn reference(&self) -> RillReference;

    async fn attach(&self, stager: Arc<Stager<T>>) -> Result<Subscription, RillError>;
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> StagingSource<T> for SyncRill<T> {
    fn reference(&self) -> RillReference {
        SyncRill::reference(self)
    }

    async fn attach(&self, stager: Arc<Stager<T>>) -> Result<Subscription, RillError> {
        self.subscribe(stager)
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> StagingSource<T> for AsyncRill<T> {
    fn reference(&self) -> RillReference {
        AsyncRill::reference(self)
    }

    async fn attach(&self, stager: Arc<Stager<T>>) -> Result<Subscription, RillError> {
        self.subscribe(stager).await
    }
}

// ---------------------------------------------------------------------------
// Stager
// ---------------------------------------------------------------------------

/// The consumer a transaction subscribes. Detaches itself on the first
/// failed event, since such a batch can never be committed.
pub struct Stager<T> {
    staged: Mutex<Vec<Event<T>>>,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    subscription: Mutex<Option<Subscription>>,
}

impl<T: Clone> Stager<T> {
    fn new() -> Self {
        Self {
            staged: Mutex::new(Vec::new()),
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            subscription: Mutex::new(None),
        }
    }

    fn stage(&self, event: &Event<T>) {
        self.events().push(event.clone());
    }

    fn acknowledge(&self) {
        self.succeeded.fetch_add(1, Ordering::AcqRel);
    }

    fn reject(&self) {
        self.failed.fetch_add(1, Ordering::AcqRel);
        self.detach();
    }

    fn attached(&self, subscription: Subscription) {
        // A failure may have been observed before the handle was stored.
        if self.failed.load(Ordering::Acquire) > 0 {
            subscription.dispose();
            return;
        }
        *self.slot() = Some(subscription);
    }

    fn detach(&self) {
        let subscription = self.slot().take();
        if let Some(subscription) = subscription {
            subscription.dispose();
        }
    }

    fn staged_count(&self) -> usize {
        self.events().len()
    }

    fn settled_count(&self) -> usize {
        self.succeeded.load(Ordering::Acquire) + self.failed.load(Ordering::Acquire)
    }

    fn has_failures(&self) -> bool {
        self.failed.load(Ordering::Acquire) > 0
    }

    fn snapshot(&self) -> Vec<Event<T>> {
        self.events().clone()
    }

    fn reset(&self) {
        self.events().clear();
        self.succeeded.store(0, Ordering::Release);
        self.failed.store(0, Ordering::Release);
    }

    fn events(&self) -> MutexGuard<'_, Vec<Event<T>>> {
        self.staged.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self) -> MutexGuard<'_, Option<Subscription>> {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Send + Sync> RillConsumer<T> for Stager<T> {
    fn on_new(&self, event: &Event<T>) -> Result<()> {
        self.stage(event);
        Ok(())
    }

    fn on_succeeded(&self, _event_id: EventId) -> Result<()> {
        self.acknowledge();
        Ok(())
    }

    fn on_failed(&self, _event_id: EventId, _error: &anyhow::Error) -> Result<()> {
        self.reject();
        Ok(())
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> AsyncRillConsumer<T> for Stager<T> {
    async fn on_new(&self, event: &Event<T>) -> Result<()> {
        self.stage(event);
        Ok(())
    }

    async fn on_succeeded(&self, _event_id: EventId) -> Result<()> {
        self.acknowledge();
        Ok(())
    }

    async fn on_failed(&self, _event_id: EventId, _error: &anyhow::Error) -> Result<()> {
        self.reject();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RillTransaction
// ---------------------------------------------------------------------------

/// Batches events emitted into a rill and commits them atomically.
///
/// Only one transaction per rill is supported at a time.
pub struct RillTransaction<'a, T, R: ?Sized> {
    rill: &'a R,
    stager: Arc<Stager<T>>,
    drain_timeout: Duration,
    drain_poll_interval: Duration,
    commit_lock: tokio::sync::Mutex<()>,
    disposed: AtomicBool,
}

impl<'a, T, R> RillTransaction<'a, T, R>
where
    T: Clone + Send + Sync + 'static,
    R: StagingSource<T> + ?Sized,
{
    /// Start staging every event emitted into `rill` from now on.
    pub async fn begin(rill: &'a R) -> Result<Self, TransactionError> {
        Self::begin_with(rill, &RillConfig::default()).await
    }

    pub async fn begin_with(rill: &'a R, config: &RillConfig) -> Result<Self, TransactionError> {
        let transaction = Self {
            rill,
            stager: Arc::new(Stager::new()),
            drain_timeout: config.drain_timeout,
            drain_poll_interval: config.drain_poll_interval,
            commit_lock: tokio::sync::Mutex::new(()),
            disposed: AtomicBool::new(false),
        };
        transaction.attach().await?;
        debug!(reference = %rill.reference(), "Transaction started");
        Ok(transaction)
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn staged_count(&self) -> usize {
        self.stager.staged_count()
    }

    /// Append everything staged so far to `store` as a single commit.
    ///
    /// On failure the transaction stays detached from the rill.
    pub async fn commit<S>(&self, store: &S) -> Result<Commit<T>, TransactionError>
    where
        S: RillStore<T> + ?Sized,
    {
        let _guard = self.commit_lock.lock().await;
        if self.disposed.load(Ordering::Acquire) {
            return Err(TransactionError::Disposed);
        }

        self.stager.detach();
        self.drain().await?;

        let events = self.stager.snapshot();
        if events.is_empty() {
            return Err(TransactionError::NothingStaged);
        }
        if self.stager.has_failures() {
            return Err(TransactionError::FailedEventObserved);
        }

        let commit = Commit::new(self.rill.reference(), events)?;
        store.append(&commit).await?;

        self.stager.reset();
        self.attach().await?;

        info!(
            reference = %commit.reference(),
            commit = %commit.id(),
            range = %commit.sequence_range(),
            events = commit.len(),
            "Transaction committed"
        );
        Ok(commit)
    }

    /// Detach from the rill. Idempotent; further commits fail.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stager.detach();
        debug!(reference = %self.rill.reference(), "Transaction disposed");
    }

    async fn attach(&self) -> Result<(), TransactionError> {
        let subscription = self.rill.attach(Arc::clone(&self.stager)).await?;
        self.stager.attached(subscription);
        Ok(())
    }

    /// Wait until every staged event has succeeded or failed.
    async fn drain(&self) -> Result<(), TransactionError> {
        let deadline = Instant::now() + self.drain_timeout;
        loop {
            let staged = self.stager.staged_count();
            let settled = self.stager.settled_count();
            if settled >= staged {
                return Ok(());
            }
            if Instant::now() >= deadline {
                error!(
                    reference = %self.rill.reference(),
                    staged,
                    settled,
                    timeout_ms = self.drain_timeout.as_millis() as u64,
                    "Staged events did not settle in time"
                );
                return Err(TransactionError::DrainTimeout {
                    staged,
                    acknowledged: settled,
                    timeout: self.drain_timeout,
                });
            }
            tokio::time::sleep(self.drain_poll_interval).await;
        }
    }
}

impl<T, R: ?Sized> Drop for RillTransaction<'_, T, R> {
    fn drop(&mut self) {
        let subscription = self
            .stager
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(subscription);
    }
}
