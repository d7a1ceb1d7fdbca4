use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rill_events::{Commit, Event, RillDetails, RillReference, Sequence, Timestamp};
use tracing::{debug, info, warn};

use crate::consumer::RillConsumer;
use crate::error::{ConsumerFailures, RillError};
use crate::rills::state::{Emission, RillState, RillStatus};
use crate::subscription::{self, Registry, Subscription};

/// Rill whose consumers run on the emitting thread.
///
/// One mutex serialises emit, subscribe, complete and dispose. It is held
/// while consumers run, so a consumer must not emit into the rill it is
/// subscribed to. Disposing its own subscription is fine.
pub struct SyncRill<T> {
    state: Mutex<RillState>,
    registry: Arc<Registry<dyn RillConsumer<T>>>,
}

impl<T: Send + Sync + 'static> SyncRill<T> {
    pub fn new(reference: RillReference) -> Self {
        Self::with_details(RillDetails::new(reference, Timestamp::now()))
    }

    /// Resume a rill at a known high-water mark, e.g. one read from a store.
    pub fn with_details(details: RillDetails) -> Self {
        Self {
            state: Mutex::new(RillState::new(details)),
            registry: Arc::new(Registry::new()),
        }
    }

    pub fn reference(&self) -> RillReference {
        self.lock().details.reference().clone()
    }

    pub fn sequence(&self) -> Sequence {
        self.lock().details.sequence()
    }

    pub fn details(&self) -> RillDetails {
        self.lock().details.clone()
    }

    pub fn status(&self) -> RillStatus {
        self.lock().status
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn emit(&self, content: T) -> Result<Event<T>, RillError> {
        self.emit_with(Emission::new(content))
    }

    pub fn emit_with(&self, emission: Emission<T>) -> Result<Event<T>, RillError> {
        let mut state = self.lock();
        state.ensure_active()?;
        let event = state.next_event(emission)?;
        self.dispatch(&state, &event)?;
        Ok(event)
    }

    /// Re-emit a fully formed event. Its sequence must be the next one.
    pub fn emit_event(&self, event: Event<T>) -> Result<Event<T>, RillError> {
        self.emit_with(event.into())
    }

    /// Replay every event of `commit` in order, holding the lock throughout.
    ///
    /// Stops at the first failing event. Returns the new high-water mark.
    pub fn emit_commit(&self, commit: &Commit<T>) -> Result<Sequence, RillError>
    where
        T: Clone,
    {
        let mut state = self.lock();
        state.ensure_active()?;
        state.ensure_reference(commit.reference())?;

        for event in commit {
            let event = state.next_event(event.clone().into())?;
            self.dispatch(&state, &event)?;
        }
        Ok(state.details.sequence())
    }

    pub fn subscribe(&self, consumer: Arc<dyn RillConsumer<T>>) -> Result<Subscription, RillError> {
        let state = self.lock();
        state.ensure_active()?;
        let key = self.registry.insert(consumer)?;
        debug!(reference = %state.details.reference(), "Consumer subscribed");
        Ok(subscription::handle(&self.registry, key))
    }

    /// Tell every consumer the rill is done. Consumer errors are logged, not
    /// returned.
    pub fn complete(&self) -> Result<(), RillError> {
        let mut state = self.lock();
        state.ensure_active()?;
        state.status = RillStatus::Completed;

        let reference = state.details.reference();
        for consumer in self.registry.snapshot() {
            if let Err(e) = consumer.on_completed() {
                warn!(reference = %reference, error = %e, "Consumer failed on completion");
            }
        }
        info!(reference = %reference, sequence = %state.details.sequence(), "Rill completed");
        Ok(())
    }

    /// Drop every subscription. Idempotent.
    pub fn dispose(&self) {
        let mut state = self.lock();
        if state.status == RillStatus::Disposed {
            return;
        }
        state.status = RillStatus::Disposed;
        let removed = self.registry.clear();
        debug!(reference = %state.details.reference(), removed, "Rill disposed");
    }

    fn lock(&self) -> MutexGuard<'_, RillState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, state: &RillState, event: &Event<T>) -> Result<(), RillError> {
        let consumers = self.registry.snapshot();
        let reference = state.details.reference();
        debug!(
            reference = %reference,
            sequence = %event.sequence(),
            event_id = %event.id(),
            consumers = consumers.len(),
            "Dispatching event"
        );

        let errors = consumers
            .iter()
            .filter_map(|c| c.on_new(event).err())
            .collect();

        match ConsumerFailures::collect(event.id(), errors) {
            None => {
                let errors = consumers
                    .iter()
                    .filter_map(|c| c.on_succeeded(event.id()).err())
                    .collect();
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
                let errors = consumers
                    .iter()
                    .filter_map(|c| c.on_failed(event.id(), &failure).err())
                    .collect();
                if let Some(failures) = ConsumerFailures::collect(event.id(), errors) {
                    return Err(RillError::FailedNotification(failures));
                }
            }
        }
        Ok(())
    }
}
