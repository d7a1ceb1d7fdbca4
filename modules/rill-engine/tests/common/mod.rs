//! Shared helpers for engine integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rill_engine::{AsyncRillConsumer, RillConsumer};
use rill_events::{Event, EventId, RillReference, Sequence};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn reference() -> RillReference {
    RillReference::new("rill-tests").unwrap()
}

pub fn seq(value: u64) -> Sequence {
    Sequence::from_u64(value).unwrap()
}

// ---------------------------------------------------------------------------
// Errors raised by test consumers
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
#[error("consumer refused event {0}")]
pub struct Refused(pub EventId);

#[derive(Debug, thiserror::Error)]
#[error("consumer broke: {0}")]
pub struct Broken(pub String);

// ---------------------------------------------------------------------------
// InterceptingConsumer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    New(EventId, Sequence),
    Succeeded(EventId),
    Failed(EventId),
    Completed,
}

#[derive(Default)]
struct Behaviour {
    refuse_new: bool,
    break_new: bool,
    break_succeeded: bool,
    break_failed: bool,
    break_completed: bool,
    delay: Option<Duration>,
}

/// Records every callback, for any content type and either rill variant.
#[derive(Default)]
pub struct InterceptingConsumer {
    calls: Mutex<Vec<Call>>,
    behaviour: Behaviour,
}

impl InterceptingConsumer {
    pub fn behaving() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fails every `on_new` with [`Refused`].
    pub fn misbehaving() -> Arc<Self> {
        Self::with(Behaviour {
            refuse_new: true,
            ..Behaviour::default()
        })
    }

    /// Fails every `on_new` with [`Broken`].
    pub fn broken() -> Arc<Self> {
        Self::with(Behaviour {
            break_new: true,
            ..Behaviour::default()
        })
    }

    pub fn failing_on_succeeded() -> Arc<Self> {
        Self::with(Behaviour {
            break_succeeded: true,
            ..Behaviour::default()
        })
    }

    pub fn failing_on_failed() -> Arc<Self> {
        Self::with(Behaviour {
            break_failed: true,
            ..Behaviour::default()
        })
    }

    pub fn failing_on_completed() -> Arc<Self> {
        Self::with(Behaviour {
            break_completed: true,
            ..Behaviour::default()
        })
    }

    /// Async only: sleeps in `on_new` before succeeding.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::with(Behaviour {
            delay: Some(delay),
            ..Behaviour::default()
        })
    }

    fn with(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            behaviour,
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn new_ids(&self) -> Vec<EventId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::New(id, _) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn new_sequences(&self) -> Vec<Sequence> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::New(_, sequence) => Some(sequence),
                _ => None,
            })
            .collect()
    }

    pub fn succeeded_ids(&self) -> Vec<EventId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Succeeded(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn failed_ids(&self) -> Vec<EventId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Failed(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn completed_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Completed))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn handle_new<T>(&self, event: &Event<T>) -> Result<()> {
        self.record(Call::New(event.id(), event.sequence()));
        if self.behaviour.refuse_new {
            return Err(Refused(event.id()).into());
        }
        if self.behaviour.break_new {
            return Err(Broken(format!("on_new {}", event.sequence())).into());
        }
        Ok(())
    }

    fn handle_succeeded(&self, event_id: EventId) -> Result<()> {
        self.record(Call::Succeeded(event_id));
        if self.behaviour.break_succeeded {
            return Err(Broken("on_succeeded".into()).into());
        }
        Ok(())
    }

    fn handle_failed(&self, event_id: EventId) -> Result<()> {
        self.record(Call::Failed(event_id));
        if self.behaviour.break_failed {
            return Err(Broken("on_failed".into()).into());
        }
        Ok(())
    }

    fn handle_completed(&self) -> Result<()> {
        self.record(Call::Completed);
        if self.behaviour.break_completed {
            return Err(Broken("on_completed".into()).into());
        }
        Ok(())
    }
}

impl<T> RillConsumer<T> for InterceptingConsumer {
    fn on_new(&self, event: &Event<T>) -> Result<()> {
        self.handle_new(event)
    }

    fn on_succeeded(&self, event_id: EventId) -> Result<()> {
        self.handle_succeeded(event_id)
    }

    fn on_failed(&self, event_id: EventId, _error: &anyhow::Error) -> Result<()> {
        self.handle_failed(event_id)
    }

    fn on_completed(&self) -> Result<()> {
        self.handle_completed()
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> AsyncRillConsumer<T> for InterceptingConsumer {
    async fn on_new(&self, event: &Event<T>) -> Result<()> {
        if let Some(delay) = self.behaviour.delay {
            tokio::time::sleep(delay).await;
        }
        self.handle_new(event)
    }

    async fn on_succeeded(&self, event_id: EventId) -> Result<()> {
        self.handle_succeeded(event_id)
    }

    async fn on_failed(&self, event_id: EventId, _error: &anyhow::Error) -> Result<()> {
        self.handle_failed(event_id)
    }

    async fn on_completed(&self) -> Result<()> {
        self.handle_completed()
    }
}
