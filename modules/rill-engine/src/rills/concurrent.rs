use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rill_events::{Commit, Event, RillDetails, RillReference, Sequence, Timestamp};
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RillConfig;
use crate::consumer::AsyncRillConsumer;
use crate::error::{ConsumerFailures, RillError};
use crate::rills::state::{Emission, RillState, RillStatus};
use crate::subscription::{self, Registry, Subscription};

/// Rill for async consumers, safe to share between tasks.
///
/// A single-permit semaphore serialises emit, subscribe, complete and
/// dispose; waiting for it is bounded by `lock_timeout`. Every operation has
/// a `*_cancellable` form that gives up when the token fires. Cancellation
/// while consumers are being awaited does not roll anything back: the
/// sequence stays advanced and already delivered callbacks stay delivered.
pub struct AsyncRill<T> {
    gate: Semaphore,
    state: Mutex<RillState>,
    registry: Arc<Registry<dyn AsyncRillConsumer<T>>>,
    lock_timeout: Duration,
}

impl<T: Send + Sync + 'static> AsyncRill<T> {
    pub fn new(reference: RillReference) -> Self {
        Self::with_config(reference, &RillConfig::default())
    }

    pub fn with_config(reference: RillReference, config: &RillConfig) -> Self {
        Self::with_details(RillDetails::new(reference, Timestamp::now()), config)
    }

    pub fn with_details(details: RillDetails, config: &RillConfig) -> Self {
        Self {
            gate: Semaphore::new(1),
            state: Mutex::new(RillState::new(details)),
            registry: Arc::new(Registry::new()),
            lock_timeout: config.lock_timeout,
        }
    }

    pub fn reference(&self) -> RillReference {
        self.state().details.reference().clone()
    }

    pub fn sequence(&self) -> Sequence {
        self.state().details.sequence()
    }

    pub fn details(&self) -> RillDetails {
        self.state().details.clone()
    }

    pub fn status(&self) -> RillStatus {
        self.state().status
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub async fn emit(&self, content: T) -> Result<Event<T>, RillError> {
        self.emit_with(Emission::new(content)).await
    }

    pub async fn emit_with(&self, emission: Emission<T>) -> Result<Event<T>, RillError> {
        self.emit_cancellable(emission, &CancellationToken::new())
            .await
    }

    pub async fn emit_event(&self, event: Event<T>) -> Result<Event<T>, RillError> {
        self.emit_with(event.into()).await
    }

    pub async fn emit_cancellable(
        &self,
        emission: Emission<T>,
        cancel: &CancellationToken,
    ) -> Result<Event<T>, RillError> {
        let _permit = self.acquire(cancel).await?;
        let (reference, event) = {
            let mut state = self.state();
            state.ensure_active()?;
            let event = state.next_event(emission)?;
            (state.details.reference().clone(), event)
        };
        self.dispatch(&reference, &event, cancel).await?;
        Ok(event)
    }

    pub async fn emit_commit(&self, commit: &Commit<T>) -> Result<Sequence, RillError>
    where
        T: Clone,
    {
        self.emit_commit_cancellable(commit, &CancellationToken::new())
            .await
    }

    /// Replay every event of `commit` in order under one acquisition.
    pub async fn emit_commit_cancellable(
        &self,
        commit: &Commit<T>,
        cancel: &CancellationToken,
    ) -> Result<Sequence, RillError>
    where
        T: Clone,
    {
        let _permit = self.acquire(cancel).await?;
        {
            let state = self.state();
            state.ensure_active()?;
            state.ensure_reference(commit.reference())?;
        }

        for event in commit {
            let event = self.state().next_event(event.clone().into())?;
            self.dispatch(commit.reference(), &event, cancel).await?;
        }
        Ok(self.sequence())
    }

    pub async fn subscribe(
        &self,
        consumer: Arc<dyn AsyncRillConsumer<T>>,
    ) -> Result<Subscription, RillError> {
        self.subscribe_cancellable(consumer, &CancellationToken::new())
            .await
    }

    pub async fn subscribe_cancellable(
        &self,
        consumer: Arc<dyn AsyncRillConsumer<T>>,
        cancel: &CancellationToken,
    ) -> Result<Subscription, RillError> {
        let _permit = self.acquire(cancel).await?;
        let state = self.state();
        state.ensure_active()?;
        let key = self.registry.insert(consumer)?;
        debug!(reference = %state.details.reference(), "Consumer subscribed");
        Ok(subscription::handle(&self.registry, key))
    }

    pub async fn complete(&self) -> Result<(), RillError> {
        self.complete_cancellable(&CancellationToken::new()).await
    }

    /// Tell every consumer the rill is done. Consumer errors are logged, not
    /// returned.
    pub async fn complete_cancellable(&self, cancel: &CancellationToken) -> Result<(), RillError> {
        let _permit = self.acquire(cancel).await?;
        let reference = {
            let mut state = self.state();
            state.ensure_active()?;
            state.status = RillStatus::Completed;
            state.details.reference().clone()
        };

        for consumer in self.registry.snapshot() {
            if let Err(e) = until_cancelled(cancel, consumer.on_completed()).await? {
                warn!(reference = %reference, error = %e, "Consumer failed on completion");
            }
        }
        info!(reference = %reference, sequence = %self.sequence(), "Rill completed");
        Ok(())
    }

    pub async fn dispose(&self) -> Result<(), RillError> {
        self.dispose_cancellable(&CancellationToken::new()).await
    }

    /// Drop every subscription and refuse further access. Idempotent.
    pub async fn dispose_cancellable(&self, cancel: &CancellationToken) -> Result<(), RillError> {
        let _permit = match self.acquire(cancel).await {
            Ok(permit) => permit,
            Err(RillError::Disposed) => return Ok(()),
            Err(e) => return Err(e),
        };

        let mut state = self.state();
        state.status = RillStatus::Disposed;
        let removed = self.registry.clear();
        self.gate.close();
        debug!(reference = %state.details.reference(), removed, "Rill disposed");
        Ok(())
    }

    fn state(&self) -> MutexGuard<'_, RillState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn acquire(&self, cancel: &CancellationToken) -> Result<SemaphorePermit<'_>, RillError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RillError::Cancelled),
            acquired = tokio::time::timeout(self.lock_timeout, self.gate.acquire()) => match acquired {
                Ok(Ok(permit)) => Ok(permit),
                Ok(Err(_closed)) => Err(RillError::Disposed),
                Err(_elapsed) => {
                    error!(
                        timeout_ms = self.lock_timeout.as_millis() as u64,
                        "Timed out waiting for rill access"
                    );
                    Err(RillError::LockTimeout(self.lock_timeout))
                }
            },
        }
    }

    async fn dispatch(
        &self,
        reference: &RillReference,
        event: &Event<T>,
        cancel: &CancellationToken,
    ) -> Result<(), RillError> {
        let consumers = self.registry.snapshot();
        debug!(
            reference = %reference,
            sequence = %event.sequence(),
            event_id = %event.id(),
            consumers = consumers.len(),
            "Dispatching event"
        );

        let mut errors = Vec::new();
        for consumer in &consumers {
            if let Err(e) = until_cancelled(cancel, consumer.on_new(event)).await? {
                errors.push(e);
            }
        }

        match ConsumerFailures::collect(event.id(), errors) {
            None => {
                let mut errors = Vec::new();
                for consumer in &consumers {
                    if let Err(e) = until_cancelled(cancel, consumer.on_succeeded(event.id())).await? {
                        errors.push(e);
                    }
                }
                if let Some(failures) = ConsumerFailures::collect(event.id(), errors) {
                    return Err(RillError::SucceededNotification(failures));
                }
            }
            Some(failures) => {
                warn!(
                    reference = %reference,
                    sequence = %event.sequence(),
                    error = %failures,
                    "Consumers failed to handle event"
                );
                let failure = anyhow::Error::new(failures);
                let mut errors = Vec::new();
                for consumer in &consumers {
                    if let Err(e) =
                        until_cancelled(cancel, consumer.on_failed(event.id(), &failure)).await?
                    {
                        errors.push(e);
                    }
                }
                if let Some(failures) = ConsumerFailures::collect(event.id(), errors) {
                    return Err(RillError::FailedNotification(failures));
                }
            }
        }
        Ok(())
    }
}

/// Await a consumer callback unless `cancel` fires first.
async fn until_cancelled<F>(
    cancel: &CancellationToken,
    callback: F,
) -> Result<anyhow::Result<()>, RillError>
where
    F: Future<Output = anyhow::Result<()>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RillError::Cancelled),
        result = callback => Ok(result),
    }
}
