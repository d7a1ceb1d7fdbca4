//! Opaque identifiers. Identity equality only, no ordering.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "Uuid", into = "Uuid")]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Rebuild from a stored value. The nil UUID is rejected.
            pub fn from_uuid(id: Uuid) -> Result<Self, ModelError> {
                if id.is_nil() {
                    return Err(ModelError::EmptyIdentifier($label));
                }
                Ok(Self(id))
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl TryFrom<Uuid> for $name {
            type Error = ModelError;

            fn try_from(id: Uuid) -> Result<Self, Self::Error> {
                Self::from_uuid(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.simple())
            }
        }
    };
}

opaque_id!(
    /// Unique identity of one event.
    EventId,
    "event id"
);

opaque_id!(
    /// Unique identity of one commit.
    CommitId,
    "commit id"
);
