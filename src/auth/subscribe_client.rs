use super::{AuthError, Result, SubscribeRequest, SubscribeResponse, Subscriber};
use crate::config::types::BackendConfig;
use async_trait::async_trait;

/// HTTP client for the subscribe endpoint
#[derive(Debug)]
pub struct SubscribeClient {
    url: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl SubscribeClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            url: config.subscribe_url.clone(),
            access_token: config.access_token.clone(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Subscriber for SubscribeClient {
    async fn subscribe(&self, request: &SubscribeRequest) -> Result<SubscribeResponse> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(AuthError::Status {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.json().await.map_err(map_transport_error)?;
        Ok(body)
    }
}

fn map_transport_error(err: reqwest::Error) -> AuthError {
    if err.is_timeout() {
        AuthError::Timeout
    } else {
        AuthError::Http(err)
    }
}
