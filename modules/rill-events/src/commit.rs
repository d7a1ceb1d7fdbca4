//! Commits and the per-rill details header.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::event::Event;
use crate::ids::CommitId;
use crate::reference::RillReference;
use crate::sequence::{Sequence, SequenceRange};
use crate::timestamp::Timestamp;

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// A non-empty, contiguous batch of events persisted together.
///
/// Immutable once built; clones share the event list.
#[derive(Debug)]
pub struct Commit<T> {
    id: CommitId,
    reference: RillReference,
    sequence_range: SequenceRange,
    timestamp: Timestamp,
    events: Arc<[Event<T>]>,
}

impl<T> Commit<T> {
    /// A new commit over `events`, spanning the first to the last sequence.
    pub fn new(reference: RillReference, events: Vec<Event<T>>) -> Result<Self, ModelError> {
        let range = span_of(&events)?;
        Self::from_parts(CommitId::new(), reference, range, Timestamp::now(), events)
    }

    /// Rebuild a stored commit. The declared range must bound the events.
    pub fn from_parts(
        id: CommitId,
        reference: RillReference,
        sequence_range: SequenceRange,
        timestamp: Timestamp,
        events: Vec<Event<T>>,
    ) -> Result<Self, ModelError> {
        let actual = span_of(&events)?;
        if actual != sequence_range {
            return Err(ModelError::CommitRangeMismatch {
                declared: sequence_range,
                actual,
            });
        }
        Ok(Self {
            id,
            reference,
            sequence_range,
            timestamp,
            events: events.into(),
        })
    }

    pub fn id(&self) -> CommitId {
        self.id
    }

    pub fn reference(&self) -> &RillReference {
        &self.reference
    }

    pub fn sequence_range(&self) -> SequenceRange {
        self.sequence_range
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn events(&self) -> &[Event<T>] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Never true for a constructed commit.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event<T>> {
        self.events.iter()
    }
}

impl<T> Clone for Commit<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            reference: self.reference.clone(),
            sequence_range: self.sequence_range,
            timestamp: self.timestamp,
            events: Arc::clone(&self.events),
        }
    }
}

impl<'a, T> IntoIterator for &'a Commit<T> {
    type Item = &'a Event<T>;
    type IntoIter = std::slice::Iter<'a, Event<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl<T> fmt::Display for Commit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.reference, self.id, self.sequence_range, self.timestamp
        )
    }
}

/// Range from the first to the last event, checking strict ordering.
fn span_of<T>(events: &[Event<T>]) -> Result<SequenceRange, ModelError> {
    let (first, last) = match (events.first(), events.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(ModelError::EmptyCommit),
    };

    for pair in events.windows(2) {
        if pair[1].sequence() <= pair[0].sequence() {
            return Err(ModelError::UnorderedCommitEvents {
                previous: pair[0].sequence(),
                next: pair[1].sequence(),
            });
        }
    }

    SequenceRange::new(first.sequence(), last.sequence())
}

// ---------------------------------------------------------------------------
// RillDetails
// ---------------------------------------------------------------------------

/// High-water mark of a rill, independent of whether any events are held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RillDetails {
    reference: RillReference,
    sequence: Sequence,
    created_at: Timestamp,
    last_changed_at: Timestamp,
}

impl RillDetails {
    /// Details of a rill without events, created at `timestamp`.
    pub fn new(reference: RillReference, timestamp: Timestamp) -> Self {
        Self {
            reference,
            sequence: Sequence::NONE,
            created_at: timestamp,
            last_changed_at: timestamp,
        }
    }

    pub fn from_parts(
        reference: RillReference,
        sequence: Sequence,
        created_at: Timestamp,
        last_changed_at: Timestamp,
    ) -> Result<Self, ModelError> {
        if last_changed_at < created_at {
            return Err(ModelError::ChangedBeforeCreated);
        }
        Ok(Self {
            reference,
            sequence,
            created_at,
            last_changed_at,
        })
    }

    pub fn reference(&self) -> &RillReference {
        &self.reference
    }

    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn last_changed_at(&self) -> Timestamp {
        self.last_changed_at
    }

    /// Move the high-water mark to `sequence`, changed at `at`.
    ///
    /// `last_changed_at` never moves before `created_at`, so replaying old
    /// events into a freshly created rill keeps the header valid.
    pub fn advanced(&self, sequence: Sequence, at: Timestamp) -> Self {
        Self {
            reference: self.reference.clone(),
            sequence,
            created_at: self.created_at,
            last_changed_at: at.max(self.created_at),
        }
    }
}
