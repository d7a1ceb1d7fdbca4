use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rill_events::{Event, EventId};

use super::{AsyncConsumable, Consumable};
use crate::consumer::{AsyncRillConsumer, RillConsumer};
use crate::error::RillError;
use crate::subscription::Subscription;

/// Narrows `Event<T>` to `Event<U>`; events holding anything else are
/// skipped without error.
pub struct OfType<S, T, U> {
    source: S,
    _types: PhantomData<fn(T) -> U>,
}

impl<S, T, U> OfType<S, T, U> {
    pub(crate) fn new(source: S) -> Self {
        Self {
            source,
            _types: PhantomData,
        }
    }
}

impl<S, T, U> Consumable<U> for OfType<S, T, U>
where
    S: Consumable<T>,
    T: Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    fn subscribe(&self, consumer: Arc<dyn RillConsumer<U>>) -> Result<Subscription, RillError> {
        self.source
            .subscribe(Arc::new(OfTypeConsumer::<_, T>::new(consumer)))
    }
}

pub struct AsyncOfType<S, T, U> {
    source: S,
    _types: PhantomData<fn(T) -> U>,
}

impl<S, T, U> AsyncOfType<S, T, U> {
    pub(crate) fn new(source: S) -> Self {
        Self {
            source,
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<S, T, U> AsyncConsumable<U> for AsyncOfType<S, T, U>
where
    S: AsyncConsumable<T>,
    T: Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    async fn subscribe(
        &self,
        consumer: Arc<dyn AsyncRillConsumer<U>>,
    ) -> Result<Subscription, RillError> {
        self.source
            .subscribe(Arc::new(OfTypeConsumer::<_, T>::new(consumer)))
            .await
    }
}

struct OfTypeConsumer<C: ?Sized, T> {
    downstream: Arc<C>,
    _source: PhantomData<fn(T)>,
}

impl<C: ?Sized, T> OfTypeConsumer<C, T> {
    fn new(downstream: Arc<C>) -> Self {
        Self {
            downstream,
            _source: PhantomData,
        }
    }
}

impl<T, U> RillConsumer<T> for OfTypeConsumer<dyn RillConsumer<U>, T>
where
    T: Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    fn on_new(&self, event: &Event<T>) -> Result<()> {
        match event.try_narrow::<U>() {
            Some(narrowed) => self.downstream.on_new(&narrowed),
            None => Ok(()),
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
impl<T, U> AsyncRillConsumer<T> for OfTypeConsumer<dyn AsyncRillConsumer<U>, T>
where
    T: Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    async fn on_new(&self, event: &Event<T>) -> Result<()> {
        match event.try_narrow::<U>() {
            Some(narrowed) => self.downstream.on_new(&narrowed).await,
            None => Ok(()),
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
