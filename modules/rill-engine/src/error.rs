use std::fmt;
use std::time::Duration;

use rill_events::{EventId, ModelError, RillReference, Sequence, StoreError};
use thiserror::Error;

/// Errors raised by consumers while handling a single event.
///
/// Every consumer is called even when an earlier one failed, so this holds one
/// entry per failing consumer, in subscription order.
#[derive(Debug)]
pub struct ConsumerFailures {
    event_id: EventId,
    errors: Vec<anyhow::Error>,
}

impl ConsumerFailures {
    /// `None` when nothing failed.
    pub(crate) fn collect(event_id: EventId, errors: Vec<anyhow::Error>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { event_id, errors })
        }
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn errors(&self) -> &[anyhow::Error] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Never true; kept for the `len` convention.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> Vec<anyhow::Error> {
        self.errors
    }
}

impl fmt::Display for ConsumerFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} consumer(s) failed on event {}",
            self.errors.len(),
            self.event_id
        )?;
        for (i, error) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{error:#}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConsumerFailures {}

#[derive(Error, Debug)]
pub enum RillError {
    #[error("Event out of order: expected sequence {expected}, got {actual}")]
    EventOutOfOrder { expected: Sequence, actual: Sequence },

    #[error("Consumer is already subscribed")]
    AlreadySubscribed,

    #[error("Rill is completed")]
    Completed,

    #[error("Rill is disposed")]
    Disposed,

    #[error("Timed out after {0:?} waiting for exclusive access to the rill")]
    LockTimeout(Duration),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Commit belongs to rill '{actual}', not '{expected}'")]
    ReferenceMismatch {
        expected: RillReference,
        actual: RillReference,
    },

    /// Consumers failed while being told that every consumer handled the event.
    #[error("Acknowledging event failed: {0}")]
    SucceededNotification(ConsumerFailures),

    /// Consumers failed while being told that some consumer rejected the event.
    #[error("Reporting failed event failed: {0}")]
    FailedNotification(ConsumerFailures),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Can not commit when no events have been staged")]
    NothingStaged,

    #[error("Can not commit after observing a failed event")]
    FailedEventObserved,

    #[error(
        "Staged events did not settle within {timeout:?}: {staged} staged, {acknowledged} acknowledged"
    )]
    DrainTimeout {
        staged: usize,
        acknowledged: usize,
        timeout: Duration,
    },

    #[error("Transaction is disposed")]
    Disposed,

    #[error(transparent)]
    Rill(#[from] RillError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),
}
