use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rill_events::{Event, EventId};

use super::{AsyncConsumable, Consumable};
use crate::consumer::{AsyncRillConsumer, RillConsumer};
use crate::error::RillError;
use crate::subscription::Subscription;

/// Content transformation. Envelope identity, sequence and timestamp are kept.
pub struct Map<S, T, U, F> {
    source: S,
    f: Arc<F>,
    _types: PhantomData<fn(T) -> U>,
}

impl<S, T, U, F> Map<S, T, U, F> {
    pub(crate) fn new(source: S, f: F) -> Self {
        Self {
            source,
            f: Arc::new(f),
            _types: PhantomData,
        }
    }
}

impl<S, T, U, F> Consumable<U> for Map<S, T, U, F>
where
    S: Consumable<T>,
    T: Send + Sync + 'static,
    U: Send + Sync + 'static,
    F: Fn(&T) -> U + Send + Sync + 'static,
{
    fn subscribe(&self, consumer: Arc<dyn RillConsumer<U>>) -> Result<Subscription, RillError> {
        self.source
            .subscribe(Arc::new(MapConsumer::<_, T, F>::new(consumer, Arc::clone(&self.f))))
    }
}

/// Async counterpart of [`Map`].
pub struct AsyncMap<S, T, U, F> {
    source: S,
    f: Arc<F>,
    _types: PhantomData<fn(T) -> U>,
}

impl<S, T, U, F> AsyncMap<S, T, U, F> {
    pub(crate) fn new(source: S, f: F) -> Self {
        Self {
            source,
            f: Arc::new(f),
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<S, T, U, F> AsyncConsumable<U> for AsyncMap<S, T, U, F>
where
    S: AsyncConsumable<T>,
    T: Send + Sync + 'static,
    U: Send + Sync + 'static,
    F: Fn(&T) -> U + Send + Sync + 'static,
{
    async fn subscribe(
        &self,
        consumer: Arc<dyn AsyncRillConsumer<U>>,
    ) -> Result<Subscription, RillError> {
        self.source
            .subscribe(Arc::new(MapConsumer::<_, T, F>::new(consumer, Arc::clone(&self.f))))
            .await
    }
}

// ---------------------------------------------------------------------------
// Wrapper consumer, shared by both variants
// ---------------------------------------------------------------------------

struct MapConsumer<C: ?Sized, T, F> {
    downstream: Arc<C>,
    f: Arc<F>,
    _source: PhantomData<fn(T)>,
}

impl<C: ?Sized, T, F> MapConsumer<C, T, F> {
    fn new(downstream: Arc<C>, f: Arc<F>) -> Self {
        Self {
            downstream,
            f,
            _source: PhantomData,
        }
    }
}

impl<T, U, F> RillConsumer<T> for MapConsumer<dyn RillConsumer<U>, T, F>
where
    T: Send + Sync + 'static,
    U: Send + Sync + 'static,
    F: Fn(&T) -> U + Send + Sync + 'static,
{
    fn on_new(&self, event: &Event<T>) -> Result<()> {
        self.downstream
            .on_new(&event.with_content((self.f)(event.content())))
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
impl<T, U, F> AsyncRillConsumer<T> for MapConsumer<dyn AsyncRillConsumer<U>, T, F>
where
    T: Send + Sync + 'static,
    U: Send + Sync + 'static,
    F: Fn(&T) -> U + Send + Sync + 'static,
{
    async fn on_new(&self, event: &Event<T>) -> Result<()> {
        let mapped = event.with_content((self.f)(event.content()));
        self.downstream.on_new(&mapped).await
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
