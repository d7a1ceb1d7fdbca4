//! The persistence boundary.
//!
//! Backends implement [`RillStore`]; the transaction only ever talks to this
//! trait. Optimistic concurrency is the store's job: `append` must check the
//! commit against the recorded high-water mark atomically.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};

use crate::commit::{Commit, RillDetails};
use crate::error::StoreError;
use crate::reference::RillReference;
use crate::sequence::SequenceRange;

/// Lazily produced commits, in sequence order.
pub type CommitStream<'a, T> =
    Pin<Box<dyn Stream<Item = Result<Commit<T>, StoreError>> + Send + 'a>>;

#[async_trait]
pub trait RillStore<T: Send + Sync + 'static>: Send + Sync {
    /// Header of a stored rill, or `None` if nothing was ever appended.
    async fn get_details(&self, reference: &RillReference)
        -> Result<Option<RillDetails>, StoreError>;

    /// Append a commit.
    ///
    /// The commit must start at `current + 1`, or at `Sequence::FIRST` for an
    /// unknown rill. A mismatch is [`StoreError::Concurrency`]; a commit that
    /// assumes an unknown rill already has events is [`StoreError::Corruption`].
    async fn append(&self, commit: &Commit<T>) -> Result<(), StoreError>;

    /// Remove a rill and all of its commits. No-op when absent.
    async fn delete(&self, reference: &RillReference) -> Result<(), StoreError>;

    /// Commits whose range overlaps `range` (boundaries inclusive), in order.
    async fn read_commits(
        &self,
        reference: &RillReference,
        range: SequenceRange,
    ) -> Result<Vec<Commit<T>>, StoreError>;

    /// Streaming variant of [`read_commits`](RillStore::read_commits).
    fn stream_commits<'a>(
        &'a self,
        reference: &'a RillReference,
        range: SequenceRange,
    ) -> CommitStream<'a, T> {
        stream::once(self.read_commits(reference, range))
            .flat_map(|result| match result {
                Ok(commits) => stream::iter(commits.into_iter().map(Ok)).left_stream(),
                Err(e) => stream::iter(std::iter::once(Err(e))).right_stream(),
            })
            .boxed()
    }
}

// ---------------------------------------------------------------------------
// Arc<S> blanket, so a store can be shared and still asserted on
// ---------------------------------------------------------------------------

#[async_trait]
impl<T, S> RillStore<T> for Arc<S>
where
    T: Send + Sync + 'static,
    S: RillStore<T> + ?Sized,
{
    async fn get_details(
        &self,
        reference: &RillReference,
    ) -> Result<Option<RillDetails>, StoreError> {
        (**self).get_details(reference).await
    }

    async fn append(&self, commit: &Commit<T>) -> Result<(), StoreError> {
        (**self).append(commit).await
    }

    async fn delete(&self, reference: &RillReference) -> Result<(), StoreError> {
        (**self).delete(reference).await
    }

    async fn read_commits(
        &self,
        reference: &RillReference,
        range: SequenceRange,
    ) -> Result<Vec<Commit<T>>, StoreError> {
        (**self).read_commits(reference, range).await
    }

    fn stream_commits<'a>(
        &'a self,
        reference: &'a RillReference,
        range: SequenceRange,
    ) -> CommitStream<'a, T> {
        (**self).stream_commits(reference, range)
    }
}
