use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A UTC instant. The default (Unix epoch) and the minimum representable
/// value are rejected as "unspecified".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "DateTime<Utc>", into = "DateTime<Utc>")]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_datetime(value: DateTime<Utc>) -> Result<Self, ModelError> {
        if value == DateTime::<Utc>::default() || value == DateTime::<Utc>::MIN_UTC {
            return Err(ModelError::UnspecifiedTimestamp);
        }
        Ok(Self(value))
    }

    /// Parse an RFC 3339 string. Only a zero offset (`Z` or `+00:00`) is accepted.
    pub fn parse(value: &str) -> Result<Self, ModelError> {
        let parsed =
            DateTime::parse_from_rfc3339(value).map_err(|e| ModelError::InvalidTimestamp {
                value: value.to_string(),
                reason: e.to_string(),
            })?;
        if parsed.offset().local_minus_utc() != 0 {
            return Err(ModelError::NonUtcTimestamp(value.to_string()));
        }
        Self::from_datetime(parsed.with_timezone(&Utc))
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl TryFrom<DateTime<Utc>> for Timestamp {
    type Error = ModelError;

    fn try_from(value: DateTime<Utc>) -> Result<Self, Self::Error> {
        Self::from_datetime(value)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(timestamp: Timestamp) -> Self {
        timestamp.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}
