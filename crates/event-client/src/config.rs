//! Subscriber configuration.

use crate::error::ClientError;
use std::time::Duration;

/// Reconnect, polling and dedup settings.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Gateway root, e.g. `http://localhost:7007`.
    pub base_url: String,
    /// First reconnect delay.
    pub base_delay: Duration,
    /// Reconnect delay cap.
    pub max_delay: Duration,
    /// Point-query interval in polling mode.
    pub poll_interval: Duration,
    /// Number of recent event identities remembered for dedup.
    pub dedup_window: usize,
    /// TCP connect timeout. The stream itself has no overall timeout.
    pub connect_timeout: Duration,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7007".to_string(),
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            poll_interval: Duration::from_secs(3),
            dedup_window: 500,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl SubscriberConfig {
    /// Defaults pointed at `base_url`.
    pub fn for_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "base_url must be http(s): {}",
                self.base_url
            )));
        }
        if self.base_delay.is_zero() {
            return Err(ClientError::Config("base_delay cannot be 0".into()));
        }
        if self.max_delay < self.base_delay {
            return Err(ClientError::Config("max_delay is below base_delay".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(ClientError::Config("poll_interval cannot be 0".into()));
        }
        if self.dedup_window == 0 {
            return Err(ClientError::Config("dedup_window cannot be 0".into()));
        }
        Ok(())
    }
}
