use std::env;
use std::time::Duration;

use tracing::info;
use typed_builder::TypedBuilder;

use crate::error::RillError;

/// Timing knobs shared by concurrent rills and transactions.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct RillConfig {
    /// Longest wait for a concurrent rill's exclusive access.
    #[builder(default = Duration::from_secs(5))]
    pub lock_timeout: Duration,

    /// Longest wait for staged events to be acknowledged on commit.
    #[builder(default = Duration::from_millis(250))]
    pub drain_timeout: Duration,

    #[builder(default = Duration::from_millis(1))]
    pub drain_poll_interval: Duration,
}

impl Default for RillConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RillConfig {
    /// Defaults, overridden by `RILL_LOCK_TIMEOUT_MS`, `RILL_DRAIN_TIMEOUT_MS`
    /// and `RILL_DRAIN_POLL_INTERVAL_MS` when set.
    pub fn from_env() -> Result<Self, RillError> {
        let defaults = Self::default();
        Ok(Self {
            lock_timeout: duration_env("RILL_LOCK_TIMEOUT_MS", defaults.lock_timeout)?,
            drain_timeout: duration_env("RILL_DRAIN_TIMEOUT_MS", defaults.drain_timeout)?,
            drain_poll_interval: duration_env(
                "RILL_DRAIN_POLL_INTERVAL_MS",
                defaults.drain_poll_interval,
            )?,
        })
    }

    /// Log the effective values.
    pub fn log(&self) {
        info!(
            lock_timeout_ms = self.lock_timeout.as_millis() as u64,
            drain_timeout_ms = self.drain_timeout.as_millis() as u64,
            drain_poll_interval_ms = self.drain_poll_interval.as_millis() as u64,
            "Rill config loaded"
        );
    }
}

fn duration_env(key: &str, default: Duration) -> Result<Duration, RillError> {
    match env::var(key) {
        Ok(raw) => parse_millis(key, &raw),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(RillError::Config(format!("{key}: {e}"))),
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration, RillError> {
    let millis: u64 = raw.trim().parse().map_err(|_| {
        RillError::Config(format!(
            "{key} must be a whole number of milliseconds, got '{raw}'"
        ))
    })?;
    if millis == 0 {
        return Err(RillError::Config(format!("{key} must be greater than 0")));
    }
    Ok(Duration::from_millis(millis))
}
