//! Configuration types for the dkr-tracker crate
//!
//! All configuration is held in-process. The tracker copies a `TrackerConfig`
//! at construction and exposes setters for the fields that may change while
//! the loop is running.

use std::time::Duration;

use crate::error::{Result, TrackerError};

/// Port the auto-tracker server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 4675;

/// Configuration for a [`DkrRandoAutoTracker`](crate::DkrRandoAutoTracker)
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Host the server runs on
    /// Default: "localhost"
    pub host: String,

    /// Port the server listens on
    /// Default: 4675
    pub port: u16,

    /// Delay between the end of one cycle and the start of the next
    /// Default: 1 second
    pub loop_delay: Duration,

    /// Consecutive failed probes before `reconnectFailed` fires
    /// Default: 5
    pub reconnect_attempts: u32,

    /// Timeout applied to every probe and resource request
    /// Default: 2 seconds
    pub request_timeout: Duration,

    /// Stop the loop when the `reconnectFailed` callback returns true
    /// Default: false
    pub stop_on_reconnect_failed: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            loop_delay: Duration::from_secs(1),
            reconnect_attempts: 5,
            request_timeout: Duration::from_secs(2),
            stop_on_reconnect_failed: false,
        }
    }
}

impl TrackerConfig {
    /// Create a new TrackerConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return the first issue found
    pub fn validate(&self) -> Result<()> {
        validate_port(self.port)?;
        validate_reconnect_attempts(self.reconnect_attempts)?;

        if self.host.is_empty() {
            return Err(TrackerError::Configuration(
                "Host must not be empty".to_string(),
            ));
        }

        if self.request_timeout == Duration::ZERO {
            return Err(TrackerError::Configuration(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_loop_delay(mut self, delay: Duration) -> Self {
        self.loop_delay = delay;
        self
    }

    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_stop_on_reconnect_failed(mut self, enabled: bool) -> Self {
        self.stop_on_reconnect_failed = enabled;
        self
    }
}

pub(crate) fn validate_port(port: u16) -> Result<()> {
    if port == 0 {
        return Err(TrackerError::Configuration(
            "Port must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_reconnect_attempts(attempts: u32) -> Result<()> {
    if attempts == 0 {
        return Err(TrackerError::Configuration(
            "Reconnect attempts must be greater than 0".to_string(),
        ));
    }
    Ok(())
}
