//! Stable identity of one logical stream.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::ModelError;

/// `(name, id)` pair identifying a rill.
///
/// Names compare case-insensitively but keep their original casing.
/// The string form is `name:id` with the id as 32 lowercase hex digits.
#[derive(Debug, Clone)]
pub struct RillReference {
    name: String,
    id: Uuid,
}

impl RillReference {
    /// A reference to a brand new rill.
    pub fn new(name: impl Into<String>) -> Result<Self, ModelError> {
        Self::from_parts(name, Uuid::new_v4())
    }

    pub fn from_parts(name: impl Into<String>, id: Uuid) -> Result<Self, ModelError> {
        let name = name.into();
        validate_name(&name)?;
        if id.is_nil() {
            return Err(ModelError::EmptyIdentifier("id"));
        }
        Ok(Self { name, id })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

fn validate_name(name: &str) -> Result<(), ModelError> {
    if name.is_empty() {
        return Err(ModelError::EmptyIdentifier("name"));
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ModelError::InvalidReferenceName(name.to_string()));
    }
    Ok(())
}

impl PartialEq for RillReference {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name.to_lowercase() == other.name.to_lowercase()
    }
}

impl Eq for RillReference {}

impl Hash for RillReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.to_lowercase().hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for RillReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.id.simple())
    }
}

impl FromStr for RillReference {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ModelError::InvalidReference {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let (name, id) = value
            .split_once(':')
            .ok_or_else(|| invalid("expected 'name:id'"))?;
        if id.is_empty() {
            return Err(ModelError::EmptyIdentifier("id"));
        }
        let id = Uuid::parse_str(id).map_err(|e| invalid(&e.to_string()))?;

        Self::from_parts(name, id)
    }
}

impl Serialize for RillReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RillReference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
