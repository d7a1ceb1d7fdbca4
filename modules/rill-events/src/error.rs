use thiserror::Error;

use crate::reference::RillReference;
use crate::sequence::{Sequence, SequenceRange};

/// Validation failures of the value model. Raised at construction time, so a
/// value that exists is always valid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Sequence can not be lower than 0, got {0}")]
    NegativeSequence(i64),

    #[error("Sequence can not exceed {max}, got {value}")]
    SequenceOverflow { value: u64, max: u64 },

    #[error("Change can not be lower than 1")]
    NonPositiveChange,

    #[error("Range must be from low to high: {lower} -> {upper}")]
    InvertedRange { lower: Sequence, upper: Sequence },

    #[error("A date time must be specified")]
    UnspecifiedTimestamp,

    #[error("Only UTC date times are valid as timestamps: {0}")]
    NonUtcTimestamp(String),

    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("An empty {0} is not allowed")]
    EmptyIdentifier(&'static str),

    #[error("Invalid reference name '{0}': only alphanumerics, '-' and '_' are allowed")]
    InvalidReferenceName(String),

    #[error("Invalid reference '{value}': {reason}")]
    InvalidReference { value: String, reason: String },

    #[error("A commit must at least contain one event")]
    EmptyCommit,

    #[error("Commit range {declared} does not bound its events {actual}")]
    CommitRangeMismatch {
        declared: SequenceRange,
        actual: SequenceRange,
    },

    #[error("Commit events must be in strictly increasing sequence order: {previous} followed by {next}")]
    UnorderedCommitEvents { previous: Sequence, next: Sequence },

    #[error("Last changed can not take place before created")]
    ChangedBeforeCreated,
}

/// Failures surfaced by a [`RillStore`](crate::store::RillStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The commit does not continue the stream's recorded high-water mark.
    /// Never retried; the caller has to re-stage against the new state.
    #[error(
        "Concurrency conflict on rill '{reference}': current sequence is {current}, expected commit to start at {expected} but it starts at {actual}"
    )]
    Concurrency {
        reference: RillReference,
        current: Sequence,
        expected: Sequence,
        actual: Sequence,
    },

    /// The commit implies a stream exists but the store has no record of it.
    #[error("Rill '{reference}' is unknown to the store but the commit starts at {sequence}")]
    Corruption {
        reference: RillReference,
        sequence: Sequence,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
