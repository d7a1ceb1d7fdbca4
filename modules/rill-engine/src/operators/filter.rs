use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rill_events::{Event, EventId};

use super::{AsyncConsumable, Consumable};
use crate::consumer::{AsyncRillConsumer, RillConsumer};
use crate::error::RillError;
use crate::subscription::Subscription;

/// Forwards `on_new` only for events matching the predicate.
pub struct Filter<S, T, P> {
    source: S,
    predicate: Arc<P>,
    _types: PhantomData<fn(T)>,
}

impl<S, T, P> Filter<S, T, P> {
    pub(crate) fn new(source: S, predicate: P) -> Self {
        Self {
            source,
            predicate: Arc::new(predicate),
            _types: PhantomData,
        }
    }
}

impl<S, T, P> Consumable<T> for Filter<S, T, P>
where
    S: Consumable<T>,
    T: Send + Sync + 'static,
    P: Fn(&Event<T>) -> bool + Send + Sync + 'static,
{
    fn subscribe(&self, consumer: Arc<dyn RillConsumer<T>>) -> Result<Subscription, RillError> {
        self.source.subscribe(Arc::new(FilterConsumer {
            downstream: consumer,
            predicate: Arc::clone(&self.predicate),
        }))
    }
}

pub struct AsyncFilter<S, T, P> {
    source: S,
    predicate: Arc<P>,
    _types: PhantomData<fn(T)>,
}

impl<S, T, P> AsyncFilter<S, T, P> {
    pub(crate) fn new(source: S, predicate: P) -> Self {
        Self {
            source,
            predicate: Arc::new(predicate),
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<S, T, P> AsyncConsumable<T> for AsyncFilter<S, T, P>
where
    S: AsyncConsumable<T>,
    T: Send + Sync + 'static,
    P: Fn(&Event<T>) -> bool + Send + Sync + 'static,
{
    async fn subscribe(
        &self,
        consumer: Arc<dyn AsyncRillConsumer<T>>,
    ) -> Result<Subscription, RillError> {
        self.source
            .subscribe(Arc::new(FilterConsumer {
                downstream: consumer,
                predicate: Arc::clone(&self.predicate),
            }))
            .await
    }
}

struct FilterConsumer<C: ?Sized, P> {
    downstream: Arc<C>,
    predicate: Arc<P>,
}

impl<T, P> RillConsumer<T> for FilterConsumer<dyn RillConsumer<T>, P>
where
    T: Send + Sync + 'static,
    P: Fn(&Event<T>) -> bool + Send + Sync + 'static,
{
    fn on_new(&self, event: &Event<T>) -> Result<()> {
        if (self.predicate)(event) {
            self.downstream.on_new(event)
        } else {
            Ok(())
        }
    }

    fn on_succeeded(&self, event_id: EventId) -> Result<()> {
        self.downstream.on_succeeded(event_id)
    }

    fn on_failed(&self, event_id: EventId, error: &anyhow::Error) -> Result<()> {
        self.downstream.on_failed(event_id, error)
    }

    fn on_completed(&self) -> Result<()> {
        self.downstream.on_completed()
    }
}

#[async_trait]
impl<T, P> AsyncRillConsumer<T> for FilterConsumer<dyn AsyncRillConsumer<T>, P>
where
    T: Send + Sync + 'static,
    P: Fn(&Event<T>) -> bool + Send + Sync + 'static,
{
    async fn on_new(&self, event: &Event<T>) -> Result<()> {
        if (self.predicate)(event) {
            self.downstream.on_new(event).await
        } else {
            Ok(())
        }
    }

    async fn on_succeeded(&self, event_id: EventId) -> Result<()> {
        self.downstream.on_succeeded(event_id).await
    }

    async fn on_failed(&self, event_id: EventId, error: &anyhow::Error) -> Result<()> {
        self.downstream.on_failed(event_id, error).await
    }

    async fn on_completed(&self) -> Result<()> {
        self.downstream.on_completed().await
    }
}
