//! Subscriber registry and the handle returned by `subscribe`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard, Weak};

use crate::error::RillError;

/// Registry side of a subscription.
pub(crate) trait Unsubscribe: Send + Sync {
    /// Remove the consumer registered under `key`. False if it was not there.
    fn unsubscribe(&self, key: usize) -> bool;
}

/// Keeps a consumer subscribed until disposed or dropped.
///
/// Disposal is idempotent and may happen from inside a callback of the rill
/// the consumer is subscribed to.
#[must_use = "dropping a Subscription unsubscribes the consumer"]
pub struct Subscription {
    key: usize,
    registry: Weak<dyn Unsubscribe>,
    disposed: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(key: usize, registry: Weak<dyn Unsubscribe>) -> Self {
        Self {
            key,
            registry,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.key);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &format_args!("{:#x}", self.key))
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered set of consumers keyed by allocation address.
///
/// Lives behind its own lock so a subscription can be disposed while the rill
/// is dispatching.
pub(crate) struct Registry<C: ?Sized> {
    entries: RwLock<Vec<(usize, Arc<C>)>>,
}

impl<C: ?Sized> Registry<C> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn insert(&self, consumer: Arc<C>) -> Result<usize, RillError> {
        let key = key_of(&consumer);
        let mut entries = self.write();
        if entries.iter().any(|(existing, _)| *existing == key) {
            return Err(RillError::AlreadySubscribed);
        }
        entries.push((key, consumer));
        Ok(key)
    }

    /// Consumers at this instant, in subscription order.
    pub(crate) fn snapshot(&self) -> Vec<Arc<C>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, consumer)| Arc::clone(consumer))
            .collect()
    }

    /// Drop every consumer; returns how many were registered.
    pub(crate) fn clear(&self) -> usize {
        let removed = std::mem::take(&mut *self.write());
        removed.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<(usize, Arc<C>)>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: ?Sized + Send + Sync> Unsubscribe for Registry<C> {
    fn unsubscribe(&self, key: usize) -> bool {
        // Dropped outside the lock: a consumer may own its own subscription.
        let removed = {
            let mut entries = self.write();
            entries
                .iter()
                .position(|(existing, _)| *existing == key)
                .map(|index| entries.remove(index))
        };
        removed.is_some()
    }
}

/// Subscription handle for a consumer already inserted into `registry`.
pub(crate) fn handle<C>(registry: &Arc<Registry<C>>, key: usize) -> Subscription
where
    C: ?Sized + Send + Sync + 'static,
{
    let weak: Weak<dyn Unsubscribe> = Arc::downgrade(registry) as Weak<dyn Unsubscribe>;
    Subscription::new(key, weak)
}

fn key_of<C: ?Sized>(consumer: &Arc<C>) -> usize {
    Arc::as_ptr(consumer) as *const () as usize
}
