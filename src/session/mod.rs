pub mod scheduler;

pub use scheduler::{Session, SessionSummary};

use crate::auth::{Credential, Identity};
use crate::config::types::PollingConfig;
use crate::poller::Filters;
use serde::Serialize;
use std::time::Duration;

/// Delays and limits that drive the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub error_retry_interval: Duration,
    pub throttle_retry_interval: Duration,
    pub max_auth_attempts: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for SchedulerConfig {
    fn from(config: &PollingConfig) -> Self {
        Self {
            poll_interval: config.interval,
            error_retry_interval: config.error_retry_interval,
            throttle_retry_interval: config.throttle_retry_interval,
            max_auth_attempts: config.max_auth_attempts.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No usable credential; the next step subscribes.
    NeedAuth,
    Polling,
    /// Waiting out a 429 before polling again.
    Throttled,
    /// Waiting out a server error or timeout before polling again.
    BackingOff,
    Terminated,
}

/// Everything needed to start streaming for one identity.
#[derive(Debug, Clone)]
pub struct LogSessionRequest {
    pub identity: Identity,
    pub initial_cursor: Option<String>,
    pub filters: Filters,
    /// Token obtained before the session started, if any.
    pub initial_credential: Option<Credential>,
}

impl LogSessionRequest {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            initial_cursor: None,
            filters: Filters::default(),
            initial_credential: None,
        }
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.initial_cursor = Some(cursor.into());
        self
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.initial_credential = Some(credential);
        self
    }
}

/// `450ms`, `5s`, `1m` style rendering for retry messages.
pub fn format_delay(delay: Duration) -> String {
    if delay.subsec_millis() != 0 || delay.as_secs() == 0 {
        format!("{}ms", delay.as_millis())
    } else {
        format!("{}s", delay.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_from_polling_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(450));
        assert_eq!(config.error_retry_interval, Duration::from_secs(5));
        assert_eq!(config.throttle_retry_interval, Duration::from_secs(60));
        assert_eq!(config.max_auth_attempts, 3);
    }

    #[test]
    fn test_format_delay() {
        assert_eq!(format_delay(Duration::from_secs(60)), "60s");
        assert_eq!(format_delay(Duration::from_secs(5)), "5s");
        assert_eq!(format_delay(Duration::from_millis(450)), "450ms");
        assert_eq!(format_delay(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_delay(Duration::ZERO), "0ms");
    }

    #[test]
    fn test_request_builder() {
        let request = LogSessionRequest::new(Identity::new("s1", "k1"))
            .with_cursor("c9")
            .with_filters(Filters::new(Some("failure".into()), None))
            .with_credential(Credential::new("t0"));

        assert_eq!(request.initial_cursor.as_deref(), Some("c9"));
        assert_eq!(request.filters.status.as_deref(), Some("failure"));
        assert_eq!(request.initial_credential, Some(Credential::new("t0")));
    }
}
