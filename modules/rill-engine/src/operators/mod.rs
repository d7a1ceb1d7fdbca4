//! Composable operators over anything consumers can subscribe to.
//!
//! Each operator wraps the downstream consumer and subscribes the wrapper to
//! its source, so `on_succeeded`, `on_failed` and `on_completed` always reach
//! the downstream consumer, even for events an operator did not forward.
//!
//! Operators are built by value from a borrowed rill:
//!
//! ```ignore
//! let subscription = rill
//!     .filter_content(|order: &Order| order.total > 100)
//!     .map(|order: &Order| order.id)
//!     .subscribe_fn(|event| { println!("{}", event.content()); Ok(()) })?;
//! ```

mod catch;
mod filter;
mod map;
mod of_type;

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rill_events::Event;

use crate::consumer::{AsyncDelegatingConsumer, AsyncRillConsumer, DelegatingConsumer, RillConsumer};
use crate::error::RillError;
use crate::rills::{AsyncRill, SyncRill};
use crate::subscription::Subscription;

pub use self::catch::{AsyncCatch, Catch};
pub use self::filter::{AsyncFilter, Filter};
pub use self::map::{AsyncMap, Map};
pub use self::of_type::{AsyncOfType, OfType};

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Something synchronous consumers can subscribe to.
pub trait Consumable<T> {
    fn subscribe(&self, consumer: Arc<dyn RillConsumer<T>>) -> Result<Subscription, RillError>;
}

/// Something async consumers can subscribe to.
#[async_trait]
pub trait AsyncConsumable<T: Send + Sync + 'static>: Send + Sync {
    async fn subscribe(
        &self,
        consumer: Arc<dyn AsyncRillConsumer<T>>,
    ) -> Result<Subscription, RillError>;
}

impl<'a, T: Send + Sync + 'static> Consumable<T> for &'a SyncRill<T> {
    fn subscribe(&self, consumer: Arc<dyn RillConsumer<T>>) -> Result<Subscription, RillError> {
        SyncRill::subscribe(self, consumer)
    }
}

#[async_trait]
impl<'a, T: Send + Sync + 'static> AsyncConsumable<T> for &'a AsyncRill<T> {
    async fn subscribe(
        &self,
        consumer: Arc<dyn AsyncRillConsumer<T>>,
    ) -> Result<Subscription, RillError> {
        AsyncRill::subscribe(self, consumer).await
    }
}

// ---------------------------------------------------------------------------
// Extension traits
// ---------------------------------------------------------------------------

pub trait ConsumableExt<T: Send + Sync + 'static>: Consumable<T> + Sized {
    /// Forward events with their content transformed by `f`.
    fn map<U, F>(self, f: F) -> Map<Self, T, U, F>
    where
        U: Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        Map::new(self, f)
    }

    /// Forward only events matching `predicate`.
    fn filter<P>(self, predicate: P) -> Filter<Self, T, P>
    where
        P: Fn(&Event<T>) -> bool + Send + Sync + 'static,
    {
        Filter::new(self, predicate)
    }

    /// Forward only events whose content matches `predicate`.
    fn filter_content<P>(
        self,
        predicate: P,
    ) -> Filter<Self, T, impl Fn(&Event<T>) -> bool + Send + Sync + 'static>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Filter::new(self, move |event: &Event<T>| predicate(event.content()))
    }

    /// Forward only events whose content is a `U`, re-typed as `Event<U>`.
    fn of_type<U>(self) -> OfType<Self, T, U>
    where
        U: Clone + Send + Sync + 'static,
    {
        OfType::new(self)
    }

    /// Hand `on_new` errors of type `E` to `handler` instead of failing the
    /// event.
    fn catch<E, H>(self, handler: H) -> Catch<Self, T, E, H>
    where
        E: std::error::Error + Send + Sync + 'static,
        H: Fn(E) + Send + Sync + 'static,
    {
        Catch::new(self, handler, anyhow::Error::downcast::<E>)
    }

    /// Hand every `on_new` error to `handler`.
    fn catch_any<H>(self, handler: H) -> Catch<Self, T, anyhow::Error, H>
    where
        H: Fn(anyhow::Error) + Send + Sync + 'static,
    {
        Catch::new(self, handler, Ok)
    }

    fn subscribe_fn<F>(self, on_new: F) -> Result<Subscription, RillError>
    where
        F: Fn(&Event<T>) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(DelegatingConsumer::new(on_new)))
    }
}

impl<T: Send + Sync + 'static, S: Consumable<T>> ConsumableExt<T> for S {}

#[async_trait]
pub trait AsyncConsumableExt<T: Send + Sync + 'static>: AsyncConsumable<T> + Sized {
    fn map<U, F>(self, f: F) -> AsyncMap<Self, T, U, F>
    where
        U: Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        AsyncMap::new(self, f)
    }

    fn filter<P>(self, predicate: P) -> AsyncFilter<Self, T, P>
    where
        P: Fn(&Event<T>) -> bool + Send + Sync + 'static,
    {
        AsyncFilter::new(self, predicate)
    }

    fn filter_content<P>(
        self,
        predicate: P,
    ) -> AsyncFilter<Self, T, impl Fn(&Event<T>) -> bool + Send + Sync + 'static>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        AsyncFilter::new(self, move |event: &Event<T>| predicate(event.content()))
    }

    fn of_type<U>(self) -> AsyncOfType<Self, T, U>
    where
        U: Clone + Send + Sync + 'static,
    {
        AsyncOfType::new(self)
    }

    fn catch<E, H>(self, handler: H) -> AsyncCatch<Self, T, E, H>
    where
        E: std::error::Error + Send + Sync + 'static,
        H: Fn(E) + Send + Sync + 'static,
    {
        AsyncCatch::new(self, handler, anyhow::Error::downcast::<E>)
    }

    fn catch_any<H>(self, handler: H) -> AsyncCatch<Self, T, anyhow::Error, H>
    where
        H: Fn(anyhow::Error) + Send + Sync + 'static,
    {
        AsyncCatch::new(self, handler, Ok)
    }

    async fn subscribe_fn<F, Fut>(self, on_new: F) -> Result<Subscription, RillError>
    where
        T: Clone,
        F: Fn(Event<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.subscribe(Arc::new(AsyncDelegatingConsumer::new(on_new)))
            .await
    }
}

impl<T: Send + Sync + 'static, S: AsyncConsumable<T>> AsyncConsumableExt<T> for S {}
