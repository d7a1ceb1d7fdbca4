//! Sequence numbers and inclusive sequence ranges.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

/// Position of an event within a rill. Immutable; `NONE` means no events yet.
///
/// Bounded by `i64::MAX` so it round-trips through signed BIGINT columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Sequence(u64);

impl Sequence {
    pub const NONE: Sequence = Sequence(0);
    pub const FIRST: Sequence = Sequence(1);
    pub const MAX: Sequence = Sequence(i64::MAX as u64);

    pub fn from_u64(value: u64) -> Result<Self, ModelError> {
        if value > Self::MAX.0 {
            return Err(ModelError::SequenceOverflow {
                value,
                max: Self::MAX.0,
            });
        }
        Ok(Self(value))
    }

    /// Advance by `change`, which must be at least 1.
    pub fn add(self, change: u64) -> Result<Self, ModelError> {
        if change == 0 {
            return Err(ModelError::NonPositiveChange);
        }
        let value = self.0.checked_add(change).ok_or(ModelError::SequenceOverflow {
            value: u64::MAX,
            max: Self::MAX.0,
        })?;
        Self::from_u64(value)
    }

    pub fn increment(self) -> Result<Self, ModelError> {
        self.add(1)
    }

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    pub fn is_first(self) -> bool {
        self == Self::FIRST
    }

    pub fn is_max(self) -> bool {
        self == Self::MAX
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::NONE
    }
}

impl TryFrom<u64> for Sequence {
    type Error = ModelError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::from_u64(value)
    }
}

impl TryFrom<i64> for Sequence {
    type Error = ModelError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < 0 {
            return Err(ModelError::NegativeSequence(value));
        }
        Self::from_u64(value as u64)
    }
}

impl From<Sequence> for u64 {
    fn from(sequence: Sequence) -> Self {
        sequence.0
    }
}

impl From<Sequence> for i64 {
    fn from(sequence: Sequence) -> Self {
        // MAX is i64::MAX, so this never truncates.
        sequence.0 as i64
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SequenceRange
// ---------------------------------------------------------------------------

/// Inclusive `[lower, upper]` range of sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct SequenceRange {
    lower: Sequence,
    upper: Sequence,
}

impl SequenceRange {
    /// Every sequence an event can have.
    pub const ANY: SequenceRange = SequenceRange {
        lower: Sequence::FIRST,
        upper: Sequence::MAX,
    };

    pub fn new(lower: Sequence, upper: Sequence) -> Result<Self, ModelError> {
        if upper < lower {
            return Err(ModelError::InvertedRange { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    pub fn first_to(upper: Sequence) -> Result<Self, ModelError> {
        Self::new(Sequence::FIRST, upper)
    }

    /// A range covering exactly one sequence.
    pub fn single(sequence: Sequence) -> Self {
        Self {
            lower: sequence,
            upper: sequence,
        }
    }

    pub fn lower(&self) -> Sequence {
        self.lower
    }

    pub fn upper(&self) -> Sequence {
        self.upper
    }

    pub fn includes(&self, sequence: Sequence) -> bool {
        sequence >= self.lower && sequence <= self.upper
    }

    /// True when the two ranges share at least one sequence. Boundaries count.
    pub fn overlaps(&self, other: &SequenceRange) -> bool {
        self.lower <= other.upper && other.lower <= self.upper
    }

    /// Number of sequences covered.
    pub fn count(&self) -> u64 {
        self.upper.value() - self.lower.value() + 1
    }

    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }
}

#[derive(Deserialize)]
struct RawRange {
    lower: Sequence,
    upper: Sequence,
}

impl TryFrom<RawRange> for SequenceRange {
    type Error = ModelError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        Self::new(raw.lower, raw.upper)
    }
}

impl fmt::Display for SequenceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "|{} -> {}|", self.lower, self.upper)
    }
}
