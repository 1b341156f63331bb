//! Session timing configuration.

use std::time::Duration;

/// Deadlines and polling intervals used by a [`Session`](crate::Session).
///
/// With the `serde` feature the struct can be loaded from a config file; all
/// durations are given in milliseconds (`exec_timeout_ms`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReplConfig {
    /// Deadline for a full Exec response (ack, output, error, prompt).
    #[cfg_attr(
        feature = "serde",
        serde(rename = "exec_timeout_ms", deserialize_with = "millis::deserialize")
    )]
    pub exec_timeout: Duration,

    /// Deadline for the raw mode banner after Ctrl-A.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "banner_timeout_ms", deserialize_with = "millis::deserialize")
    )]
    pub banner_timeout: Duration,

    /// Timeout of a single link read; bounds how late a deadline is noticed.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "poll_interval_ms", deserialize_with = "millis::deserialize")
    )]
    pub poll_interval: Duration,

    /// Upper bound on discarding stale input after the interrupts.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "drain_timeout_ms", deserialize_with = "millis::deserialize")
    )]
    pub drain_timeout: Duration,
}

impl Default for ReplConfig {
    fn default() -> Self {
        ReplConfig {
            exec_timeout: Duration::from_secs(10),
            banner_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(20),
            drain_timeout: Duration::from_millis(50),
        }
    }
}

impl ReplConfig {
    /// Replace the Exec deadline.
    pub fn with_exec_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = timeout;
        self
    }
}

#[cfg(feature = "serde")]
mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
