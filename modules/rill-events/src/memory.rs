//! In-memory [`RillStore`]. Reference implementation of the store contract;
//! used by tests and local development, no durability.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::commit::{Commit, RillDetails};
use crate::error::StoreError;
use crate::reference::RillReference;
use crate::sequence::{Sequence, SequenceRange};
use crate::store::RillStore;

struct StoredRill<T> {
    details: RillDetails,
    commits: Vec<Commit<T>>,
}

/// Thread-safe map of rills to their commits.
pub struct InMemoryRillStore<T> {
    rills: RwLock<HashMap<RillReference, StoredRill<T>>>,
}

impl<T> InMemoryRillStore<T> {
    pub fn new() -> Self {
        Self {
            rills: RwLock::new(HashMap::new()),
        }
    }

    /// Number of rills currently held (for test assertions).
    pub fn rill_count(&self) -> usize {
        self.rills
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<T> Default for InMemoryRillStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> RillStore<T> for InMemoryRillStore<T> {
    async fn get_details(
        &self,
        reference: &RillReference,
    ) -> Result<Option<RillDetails>, StoreError> {
        let rills = self.rills.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rills.get(reference).map(|rill| rill.details.clone()))
    }

    async fn append(&self, commit: &Commit<T>) -> Result<(), StoreError> {
        let range = commit.sequence_range();
        let mut rills = self.rills.write().unwrap_or_else(PoisonError::into_inner);

        match rills.get_mut(commit.reference()) {
            Some(rill) => {
                let current = rill.details.sequence();
                let expected = current.increment()?;
                if range.lower() != expected {
                    return Err(StoreError::Concurrency {
                        reference: commit.reference().clone(),
                        current,
                        expected,
                        actual: range.lower(),
                    });
                }
                rill.details = rill.details.advanced(range.upper(), commit.timestamp());
                rill.commits.push(commit.clone());
            }
            None => {
                if range.lower() != Sequence::FIRST {
                    return Err(StoreError::Corruption {
                        reference: commit.reference().clone(),
                        sequence: range.lower(),
                    });
                }
                let details = RillDetails::new(commit.reference().clone(), commit.timestamp())
                    .advanced(range.upper(), commit.timestamp());
                rills.insert(
                    commit.reference().clone(),
                    StoredRill {
                        details,
                        commits: vec![commit.clone()],
                    },
                );
            }
        }

        debug!(
            reference = %commit.reference(),
            commit = %commit.id(),
            range = %range,
            "Commit appended"
        );
        Ok(())
    }

    async fn delete(&self, reference: &RillReference) -> Result<(), StoreError> {
        let removed = self
            .rills
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(reference)
            .is_some();
        if removed {
            debug!(reference = %reference, "Rill deleted");
        }
        Ok(())
    }

    async fn read_commits(
        &self,
        reference: &RillReference,
        range: SequenceRange,
    ) -> Result<Vec<Commit<T>>, StoreError> {
        let rills = self.rills.read().unwrap_or_else(PoisonError::into_inner);
        let Some(rill) = rills.get(reference) else {
            return Ok(Vec::new());
        };

        Ok(rill
            .commits
            .iter()
            .filter(|commit| range.is_any() || commit.sequence_range().overlaps(&range))
            .cloned()
            .collect())
    }
}
