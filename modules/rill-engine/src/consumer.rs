//! The consumer protocol.
//!
//! A consumer sees every event through `on_new`, then exactly one of
//! `on_succeeded` (every consumer handled it) or `on_failed` (at least one
//! consumer returned an error). `on_completed` fires once when the rill
//! completes. Errors are returned, never panicked.

use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use rill_events::{Event, EventId};

/// Synchronous consumer, called on the emitting thread.
pub trait RillConsumer<T>: Send + Sync {
    fn on_new(&self, event: &Event<T>) -> Result<()>;

    fn on_succeeded(&self, _event_id: EventId) -> Result<()> {
        Ok(())
    }

    fn on_failed(&self, _event_id: EventId, _error: &anyhow::Error) -> Result<()> {
        Ok(())
    }

    fn on_completed(&self) -> Result<()> {
        Ok(())
    }
}

/// Consumer of a concurrent rill. Callbacks of one rill never overlap.
#[async_trait]
pub trait AsyncRillConsumer<T: Send + Sync + 'static>: Send + Sync {
    async fn on_new(&self, event: &Event<T>) -> Result<()>;

    async fn on_succeeded(&self, _event_id: EventId) -> Result<()> {
        Ok(())
    }

    async fn on_failed(&self, _event_id: EventId, _error: &anyhow::Error) -> Result<()> {
        Ok(())
    }

    async fn on_completed(&self) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Closure adapters
// ---------------------------------------------------------------------------

type OnNew<T> = Box<dyn Fn(&Event<T>) -> Result<()> + Send + Sync>;
type OnSucceeded = Box<dyn Fn(EventId) -> Result<()> + Send + Sync>;
type OnFailed = Box<dyn Fn(EventId, &anyhow::Error) -> Result<()> + Send + Sync>;
type OnCompleted = Box<dyn Fn() -> Result<()> + Send + Sync>;

/// [`RillConsumer`] built from closures.
///
/// ```ignore
/// let consumer = DelegatingConsumer::new(|event: &Event<u32>| {
///     println!("{}", event.content());
///     Ok(())
/// })
/// .when_failed(|id, error| {
///     eprintln!("{id}: {error}");
///     Ok(())
/// });
/// ```
pub struct DelegatingConsumer<T> {
    on_new: OnNew<T>,
    on_succeeded: Option<OnSucceeded>,
    on_failed: Option<OnFailed>,
    on_completed: Option<OnCompleted>,
}

impl<T> DelegatingConsumer<T> {
    pub fn new(on_new: impl Fn(&Event<T>) -> Result<()> + Send + Sync + 'static) -> Self {
        Self {
            on_new: Box::new(on_new),
            on_succeeded: None,
            on_failed: None,
            on_completed: None,
        }
    }

    pub fn when_succeeded(mut self, f: impl Fn(EventId) -> Result<()> + Send + Sync + 'static) -> Self {
        self.on_succeeded = Some(Box::new(f));
        self
    }

    pub fn when_failed(
        mut self,
        f: impl Fn(EventId, &anyhow::Error) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.on_failed = Some(Box::new(f));
        self
    }

    pub fn when_completed(mut self, f: impl Fn() -> Result<()> + Send + Sync + 'static) -> Self {
        self.on_completed = Some(Box::new(f));
        self
    }
}

impl<T> RillConsumer<T> for DelegatingConsumer<T> {
    fn on_new(&self, event: &Event<T>) -> Result<()> {
        (self.on_new)(event)
    }

    fn on_succeeded(&self, event_id: EventId) -> Result<()> {
        self.on_succeeded.as_ref().map_or(Ok(()), |f| f(event_id))
    }

    fn on_failed(&self, event_id: EventId, error: &anyhow::Error) -> Result<()> {
        self.on_failed.as_ref().map_or(Ok(()), |f| f(event_id, error))
    }

    fn on_completed(&self) -> Result<()> {
        self.on_completed.as_ref().map_or(Ok(()), |f| f())
    }
}

type AsyncOnNew<T> = Box<dyn Fn(Event<T>) -> BoxFuture<'static, Result<()>> + Send + Sync>;
type AsyncOnSucceeded = Box<dyn Fn(EventId) -> BoxFuture<'static, Result<()>> + Send + Sync>;
type AsyncOnFailed = Box<dyn Fn(EventId, String) -> BoxFuture<'static, Result<()>> + Send + Sync>;
type AsyncOnCompleted = Box<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// [`AsyncRillConsumer`] built from closures returning futures.
///
/// The closures get owned values so their futures can be `'static`: the event
/// is cloned and a failure arrives as its rendered message.
pub struct AsyncDelegatingConsumer<T> {
    on_new: AsyncOnNew<T>,
    on_succeeded: Option<AsyncOnSucceeded>,
    on_failed: Option<AsyncOnFailed>,
    on_completed: Option<AsyncOnCompleted>,
}

impl<T> AsyncDelegatingConsumer<T> {
    pub fn new<F, Fut>(on_new: F) -> Self
    where
        F: Fn(Event<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            on_new: Box::new(move |event| on_new(event).boxed()),
            on_succeeded: None,
            on_failed: None,
            on_completed: None,
        }
    }

    pub fn when_succeeded<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(EventId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_succeeded = Some(Box::new(move |id| f(id).boxed()));
        self
    }

    pub fn when_failed<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(EventId, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_failed = Some(Box::new(move |id, error| f(id, error).boxed()));
        self
    }

    pub fn when_completed<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_completed = Some(Box::new(move || f().boxed()));
        self
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> AsyncRillConsumer<T> for AsyncDelegatingConsumer<T> {
    async fn on_new(&self, event: &Event<T>) -> Result<()> {
        (self.on_new)(event.clone()).await
    }

    async fn on_succeeded(&self, event_id: EventId) -> Result<()> {
        match &self.on_succeeded {
            Some(f) => f(event_id).await,
            None => Ok(()),
        }
    }

    async fn on_failed(&self, event_id: EventId, error: &anyhow::Error) -> Result<()> {
        match &self.on_failed {
            Some(f) => f(event_id, format!("{error:#}")).await,
            None => Ok(()),
        }
    }

    async fn on_completed(&self) -> Result<()> {
        match &self.on_completed {
            Some(f) => f().await,
            None => Ok(()),
        }
    }
}
