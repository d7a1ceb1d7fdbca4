//! The event envelope.

use std::any::{self, Any};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ids::EventId;
use crate::sequence::Sequence;
use crate::timestamp::Timestamp;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Binds identity, position and time to a piece of content.
///
/// Two events are equal when their ids are equal, regardless of content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T> {
    id: EventId,
    sequence: Sequence,
    timestamp: Timestamp,
    content: T,
}

impl<T> Event<T> {
    /// A fresh event: new id, `Sequence::FIRST`, stamped now.
    pub fn new(content: T) -> Self {
        Self::from_parts(EventId::new(), Sequence::FIRST, Timestamp::now(), content)
    }

    pub fn from_parts(id: EventId, sequence: Sequence, timestamp: Timestamp, content: T) -> Self {
        Self {
            id,
            sequence,
            timestamp,
            content,
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn content(&self) -> &T {
        &self.content
    }

    pub fn into_content(self) -> T {
        self.content
    }

    /// Same identity, sequence and timestamp with different content.
    pub fn with_content<U>(&self, content: U) -> Event<U> {
        Event::from_parts(self.id, self.sequence, self.timestamp, content)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Event<U> {
        Event::from_parts(self.id, self.sequence, self.timestamp, f(self.content))
    }

    /// Erase the content type.
    pub fn into_any(self) -> Event<AnyContent>
    where
        T: Send + Sync + 'static,
    {
        self.map(AnyContent::new)
    }
}

impl<T: 'static> Event<T> {
    /// Re-type the envelope when the content's runtime type is `U`.
    ///
    /// Content that is an [`AnyContent`] box is narrowed by what it holds.
    pub fn try_narrow<U: Clone + 'static>(&self) -> Option<Event<U>> {
        let content: &dyn Any = &self.content;
        if let Some(narrowed) = content.downcast_ref::<U>() {
            return Some(self.with_content(narrowed.clone()));
        }
        content
            .downcast_ref::<AnyContent>()
            .and_then(|boxed| boxed.downcast_ref::<U>())
            .map(|narrowed| self.with_content(narrowed.clone()))
    }
}

impl<T> PartialEq for Event<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Event<T> {}

impl<T> std::hash::Hash for Event<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ---------------------------------------------------------------------------
// AnyContent
// ---------------------------------------------------------------------------

/// Type-erased, cheaply cloneable content for rills carrying mixed types.
#[derive(Clone)]
pub struct AnyContent {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl AnyContent {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: any::type_name::<T>(),
        }
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Name of the held type, for diagnostics only.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for AnyContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyContent").field(&self.type_name).finish()
    }
}
