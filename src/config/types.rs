use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_POLL_URL: &str = "https://partners.shopify.com/app_logs/poll";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_poll_url")]
    pub poll_url: String,
    /// Endpoint of the subscribe call. Has no default; must come from the
    /// config file or the command line.
    #[serde(default)]
    pub subscribe_url: String,
    /// Bearer credential for the subscribe call, if the backend requires one.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            poll_url: default_poll_url(),
            subscribe_url: String::new(),
            access_token: None,
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_poll_url() -> String {
    DEFAULT_POLL_URL.to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between successful polls.
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
    /// Delay after a server error or timeout.
    #[serde(default = "default_error_retry_interval", with = "humantime_serde")]
    pub error_retry_interval: Duration,
    /// Delay after the server throttles us (HTTP 429).
    #[serde(default = "default_throttle_retry_interval", with = "humantime_serde")]
    pub throttle_retry_interval: Duration,
    /// Consecutive subscribe transport failures tolerated before the session ends.
    #[serde(default = "default_max_auth_attempts")]
    pub max_auth_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            error_retry_interval: default_error_retry_interval(),
            throttle_retry_interval: default_throttle_retry_interval(),
            max_auth_attempts: default_max_auth_attempts(),
        }
    }
}

fn default_interval() -> Duration {
    Duration::from_millis(450)
}

fn default_error_retry_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_throttle_retry_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_max_auth_attempts() -> u32 {
    3
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// When set, every decoded record is also written below this directory.
    #[serde(default)]
    pub write_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
