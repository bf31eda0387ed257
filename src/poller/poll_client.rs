use super::{classify_status, parse_success_body, query_params, Filters, LogPoller, PollOutcome};
use crate::auth::Credential;
use crate::config::types::BackendConfig;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PollError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed poll response: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PollError>;

/// HTTP client for the poll endpoint
#[derive(Debug)]
pub struct PollClient {
    url: String,
    client: reqwest::Client,
}

impl PollClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            url: config.poll_url.clone(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch(&self, credential: &Credential, cursor: &str, filters: &Filters) -> Result<PollOutcome> {
        let params = query_params(cursor, filters);
        let mut request = self.client.get(&self.url).bearer_auth(credential.as_str());
        if !params.is_empty() {
            request = request.query(&params);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            let batch = parse_success_body(&body)?;
            debug!(
                records = batch.events.len(),
                skipped = batch.decode_errors.len(),
                cursor = ?batch.cursor,
                "Fetched app logs"
            );
            return Ok(PollOutcome::Success(batch));
        }

        debug!(status = status.as_u16(), "Poll returned error status");
        Ok(classify_status(
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
            &body,
        ))
    }
}

#[async_trait]
impl LogPoller for PollClient {
    /// Transport failures, timeouts included, are reported as transient so
    /// the session backs off instead of ending.
    async fn poll(&self, credential: &Credential, cursor: &str, filters: &Filters) -> PollOutcome {
        match self.fetch(credential, cursor, filters).await {
            Ok(outcome) => outcome,
            Err(PollError::Http(e)) if e.is_timeout() => {
                warn!(url = %self.url, "Poll request timed out");
                PollOutcome::TransientServerError {
                    message: "request timed out".to_string(),
                }
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "Poll request failed");
                PollOutcome::TransientServerError {
                    message: e.to_string(),
                }
            }
        }
    }
}
