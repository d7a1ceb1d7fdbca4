use rill_events::{Event, EventId, RillDetails, RillReference, Sequence, Timestamp};

use crate::error::RillError;

/// Content to emit, with optional overrides for the envelope.
///
/// A supplied sequence must equal the rill's next sequence; anything else is
/// rejected with [`RillError::EventOutOfOrder`].
#[derive(Debug, Clone)]
pub struct Emission<T> {
    content: T,
    id: Option<EventId>,
    sequence: Option<Sequence>,
    timestamp: Option<Timestamp>,
}

impl<T> Emission<T> {
    pub fn new(content: T) -> Self {
        Self {
            content,
            id: None,
            sequence: None,
            timestamp: None,
        }
    }

    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Re-emission of a fully formed event keeps all of its envelope.
impl<T> From<Event<T>> for Emission<T> {
    fn from(event: Event<T>) -> Self {
        let (id, sequence, timestamp) = (event.id(), event.sequence(), event.timestamp());
        Self::new(event.into_content())
            .with_id(id)
            .with_sequence(sequence)
            .with_timestamp(timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RillStatus {
    Active,
    Completed,
    Disposed,
}

/// What a rill guards under its exclusion: the high-water mark and lifecycle.
pub(crate) struct RillState {
    pub(crate) details: RillDetails,
    pub(crate) status: RillStatus,
}

impl RillState {
    pub(crate) fn new(details: RillDetails) -> Self {
        Self {
            details,
            status: RillStatus::Active,
        }
    }

    pub(crate) fn ensure_active(&self) -> Result<(), RillError> {
        match self.status {
            RillStatus::Active => Ok(()),
            RillStatus::Completed => Err(RillError::Completed),
            RillStatus::Disposed => Err(RillError::Disposed),
        }
    }

    pub(crate) fn ensure_reference(&self, reference: &RillReference) -> Result<(), RillError> {
        if self.details.reference() != reference {
            return Err(RillError::ReferenceMismatch {
                expected: self.details.reference().clone(),
                actual: reference.clone(),
            });
        }
        Ok(())
    }

    /// Assign the next sequence and build the envelope.
    ///
    /// Leaves the state untouched on error.
    pub(crate) fn next_event<T>(&mut self, emission: Emission<T>) -> Result<Event<T>, RillError> {
        let next = self.details.sequence().increment()?;
        if let Some(actual) = emission.sequence {
            if actual != next {
                return Err(RillError::EventOutOfOrder {
                    expected: next,
                    actual,
                });
            }
        }

        let timestamp = emission.timestamp.unwrap_or_else(Timestamp::now);
        self.details = self.details.advanced(next, timestamp);

        Ok(Event::from_parts(
            emission.id.unwrap_or_else(EventId::new),
            next,
            timestamp,
            emission.content,
        ))
    }
}
