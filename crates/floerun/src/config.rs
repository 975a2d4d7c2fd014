//! # Instance Configuration
//!
//! Settings read once from `Properties` when a communicator is built.
//!
//! | Key | Default |
//! |-----|---------|
//! | `Floe.RetryIntervals` | `0` |
//! | `Floe.Default.Host` | `localhost` |
//! | `Floe.Default.EndpointSelection` | `Random` |
//! | `Floe.Default.PreferSecure` | `0` |
//! | `Floe.Default.CollocationOptimized` | `1` |
//! | `Floe.Default.LocatorCacheTimeout` | `-1` |
//! | `Floe.Default.Locator` | unset |
//! | `Floe.ThreadPerConnection` | `0` |

use std::time::Duration;

use crate::error::Error;
use crate::error::Result;
use crate::properties::Properties;
use crate::reference::EndpointSelection;

/// How many times a call may be attempted, and how long to wait between tries.
///
/// Each interval grants one more attempt, so `max_attempts` is always one more
/// than the number of intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    intervals: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(intervals: Vec<Duration>) -> Self {
        Self { intervals }
    }

    pub fn no_retry() -> Self {
        Self::new(Vec::new())
    }

    /// Parses whitespace-separated millisecond delays. A lone `-1` disables retry.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || Error::InvalidProperty {
            key: "Floe.RetryIntervals".into(),
            value: value.to_owned(),
        };

        let mut intervals = Vec::new();
        for (i, part) in value.split_whitespace().enumerate() {
            let ms: i64 = part.parse().map_err(|_| invalid())?;
            match ms {
                -1 if i == 0 => return Ok(Self::no_retry()),
                ms if ms < 0 => return Err(invalid()),
                ms => intervals.push(Duration::from_millis(ms as u64)),
            }
        }
        Ok(Self::new(intervals))
    }

    pub fn max_attempts(&self) -> usize {
        self.intervals.len() + 1
    }

    /// Delay before the attempt after `failed_attempt` (1-based), or `None`
    /// once the policy is exhausted.
    pub fn delay_after(&self, failed_attempt: usize) -> Option<Duration> {
        failed_attempt
            .checked_sub(1)
            .and_then(|i| self.intervals.get(i))
            .copied()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(vec![Duration::ZERO])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    pub retry: RetryPolicy,
    pub default_host: String,
    pub endpoint_selection: EndpointSelection,
    pub prefer_secure: bool,
    pub collocation_optimized: bool,
    pub locator_cache_timeout: i32,
    pub thread_per_connection: bool,
    /// Proxy string of the locator handed to every new reference.
    pub default_locator: Option<String>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            default_host: "localhost".into(),
            endpoint_selection: EndpointSelection::Random,
            prefer_secure: false,
            collocation_optimized: true,
            locator_cache_timeout: -1,
            thread_per_connection: false,
            default_locator: None,
        }
    }
}

impl InstanceConfig {
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let defaults = Self::default();

        let retry = match props.get("Floe.RetryIntervals") {
            Some(value) => RetryPolicy::parse(value)?,
            None => defaults.retry,
        };

        let endpoint_selection: EndpointSelection = match props.get("Floe.Default.EndpointSelection") {
            Some(value) => value.parse().map_err(|_| Error::InvalidProperty {
                key: "Floe.Default.EndpointSelection".into(),
                value: value.to_owned(),
            })?,
            None => defaults.endpoint_selection,
        };

        Ok(Self {
            retry,
            default_host: props.get_or("Floe.Default.Host", &defaults.default_host),
            endpoint_selection,
            prefer_secure: props.get_int_or("Floe.Default.PreferSecure", 0)? > 0,
            collocation_optimized: props.get_int_or("Floe.Default.CollocationOptimized", 1)? > 0,
            locator_cache_timeout: props
                .get_int_or("Floe.Default.LocatorCacheTimeout", defaults.locator_cache_timeout)?,
            thread_per_connection: props.get_int_or("Floe.ThreadPerConnection", 0)? > 0,
            default_locator: props.get("Floe.Default.Locator").map(str::to_owned),
        })
    }
}
