use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rill_events::{Event, EventId};

use super::{AsyncConsumable, Consumable};
use crate::consumer::{AsyncRillConsumer, RillConsumer};
use crate::error::RillError;
use crate::subscription::Subscription;

/// Pulls the caught error type out of a consumer error, or hands it back.
type Extract<E> = fn(anyhow::Error) -> std::result::Result<E, anyhow::Error>;

/// Diverts matching `on_new` errors of the downstream consumer to a handler.
///
/// A diverted error no longer counts as a failure, so the event can still
/// succeed for every consumer of the rill.
pub struct Catch<S, T, E, H> {
    source: S,
    handler: Arc<H>,
    extract: Extract<E>,
    _types: PhantomData<fn(T)>,
}

impl<S, T, E, H> Catch<S, T, E, H> {
    pub(crate) fn new(source: S, handler: H, extract: Extract<E>) -> Self {
        Self {
            source,
            handler: Arc::new(handler),
            extract,
            _types: PhantomData,
        }
    }
}

impl<S, T, E, H> Consumable<T> for Catch<S, T, E, H>
where
    S: Consumable<T>,
    T: Send + Sync + 'static,
    E: 'static,
    H: Fn(E) + Send + Sync + 'static,
{
    fn subscribe(&self, consumer: Arc<dyn RillConsumer<T>>) -> Result<Subscription, RillError> {
        self.source.subscribe(Arc::new(CatchConsumer {
            downstream: consumer,
            handler: Arc::clone(&self.handler),
            extract: self.extract,
        }))
    }
}

pub struct AsyncCatch<S, T, E, H> {
    source: S,
    handler: Arc<H>,
    extract: Extract<E>,
    _types: PhantomData<fn(T)>,
}

impl<S, T, E, H> AsyncCatch<S, T, E, H> {
    pub(crate) fn new(source: S, handler: H, extract: Extract<E>) -> Self {
        Self {
            source,
            handler: Arc::new(handler),
            extract,
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<S, T, E, H> AsyncConsumable<T> for AsyncCatch<S, T, E, H>
where
    S: AsyncConsumable<T>,
    T: Send + Sync + 'static,
    E: 'static,
    H: Fn(E) + Send + Sync + 'static,
{
    async fn subscribe(
        &self,
        consumer: Arc<dyn AsyncRillConsumer<T>>,
    ) -> Result<Subscription, RillError> {
        self.source
            .subscribe(Arc::new(CatchConsumer {
                downstream: consumer,
                handler: Arc::clone(&self.handler),
                extract: self.extract,
            }))
            .await
    }
}

struct CatchConsumer<C: ?Sized, E, H> {
    downstream: Arc<C>,
    handler: Arc<H>,
    extract: Extract<E>,
}

impl<C: ?Sized, E, H: Fn(E)> CatchConsumer<C, E, H> {
    fn settle(&self, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(error) => match (self.extract)(error) {
                Ok(caught) => {
                    (self.handler)(caught);
                    Ok(())
                }
                Err(error) => Err(error),
            },
        }
    }
}

impl<T, E, H> RillConsumer<T> for CatchConsumer<dyn RillConsumer<T>, E, H>
where
    T: Send + Sync + 'static,
    E: 'static,
    H: Fn(E) + Send + Sync + 'static,
{
    fn on_new(&self, event: &Event<T>) -> Result<()> {
        self.settle(self.downstream.on_new(event))
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
impl<T, E, H> AsyncRillConsumer<T> for CatchConsumer<dyn AsyncRillConsumer<T>, E, H>
where
    T: Send + Sync + 'static,
    E: 'static,
    H: Fn(E) + Send + Sync + 'static,
{
    async fn on_new(&self, event: &Event<T>) -> Result<()> {
        let result = self.downstream.on_new(event).await;
        self.settle(result)
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
