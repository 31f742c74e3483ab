//! Relay configuration types
//!
//! `RelayConfig` holds the tuning knobs of the engine and its transports.
//! `RelayRequest` holds what a single invocation asks for: which buses to join
//! and for how long.

use crate::types::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the relay engine and the built-in transports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Longest single wait on the source bus (default: 100ms)
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,

    /// Bounded wait for a frame to be accepted by the target (default: 100ms)
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,

    /// Consecutive send failures after which the target is declared unreachable (default: 3)
    #[serde(default = "default_max_send_failures")]
    pub max_consecutive_send_failures: u32,

    /// Receive queue depth of each virtual bus handle (default: 1024)
    #[serde(default = "default_queue_capacity")]
    pub virtual_queue_capacity: usize,
}

fn default_poll_timeout() -> u64 {
    100
}

fn default_send_timeout() -> u64 {
    100
}

fn default_max_send_failures() -> u32 {
    3
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout(),
            send_timeout_ms: default_send_timeout(),
            max_consecutive_send_failures: default_max_send_failures(),
            virtual_queue_capacity: default_queue_capacity(),
        }
    }
}

impl RelayConfig {
    /// Create a new relay configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the source poll timeout
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Builder method: set the bounded send wait
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Builder method: set the consecutive send failure threshold
    pub fn with_max_consecutive_send_failures(mut self, threshold: u32) -> Self {
        self.max_consecutive_send_failures = threshold;
        self
    }

    /// Builder method: set the virtual bus queue depth
    pub fn with_virtual_queue_capacity(mut self, capacity: usize) -> Self {
        self.virtual_queue_capacity = capacity;
        self
    }

    /// Poll timeout as a `Duration`
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Send timeout as a `Duration`
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.poll_timeout_ms == 0 {
            return Err(RelayError::InvalidConfig(
                "poll_timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.send_timeout_ms == 0 {
            return Err(RelayError::InvalidConfig(
                "send_timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.max_consecutive_send_failures == 0 {
            return Err(RelayError::InvalidConfig(
                "max_consecutive_send_failures must be at least 1".to_string(),
            ));
        }
        if self.virtual_queue_capacity == 0 {
            return Err(RelayError::InvalidConfig(
                "virtual_queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// What one relay invocation asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    /// Interface frames are read from
    pub source: String,
    /// Interface frames are written to
    pub target: String,
    /// How long to relay; `None` runs until cancelled
    pub duration: Option<Duration>,
}

impl RelayRequest {
    /// Relay from `source` to `target` until cancelled
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            duration: None,
        }
    }

    /// Builder method: bound the run to `duration`; zero means unbounded
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = if duration.is_zero() {
            None
        } else {
            Some(duration)
        };
        self
    }

    /// Builder method: bound the run to a number of seconds; `0` means unbounded
    pub fn with_duration_secs(self, secs: f64) -> Result<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(RelayError::InvalidDuration(secs));
        }
        if secs == 0.0 {
            return Ok(self.with_duration(Duration::ZERO));
        }
        // Sub-nanosecond values still ask for a bounded run.
        let duration = Duration::try_from_secs_f64(secs)
            .map_err(|_| RelayError::InvalidDuration(secs))?
            .max(Duration::from_nanos(1));
        Ok(self.with_duration(duration))
    }

    /// True when the run only ends by cancellation or failure
    pub fn is_unbounded(&self) -> bool {
        self.duration.is_none()
    }
}
