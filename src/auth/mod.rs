pub mod subscribe_client;

pub use subscribe_client::SubscribeClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("subscribe request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("subscribe request timed out")]
    Timeout,

    #[error("subscribe endpoint returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("subscription rejected: {}", .0.join(", "))]
    Rejected(Vec<String>),

    #[error("subscribe response carried no token")]
    MissingToken,
}

impl AuthError {
    /// Whether a later attempt with the same identity may succeed.
    /// Rejections by the backend are final; transport trouble is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            AuthError::Http(_) | AuthError::Timeout => true,
            AuthError::Status { status, .. } => *status == 429 || *status >= 500,
            AuthError::Rejected(_) | AuthError::MissingToken => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

/// The store and application a stream is authorized for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub store_id: String,
    pub api_key: String,
}

impl Identity {
    pub fn new(store_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            api_key: api_key.into(),
        }
    }
}

/// Bearer token for the poll endpoint. Expiry is only learned from a 401.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix suitable for logs.
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(6).collect();
        format!("{}…", prefix)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.redacted()).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub shop_ids: Vec<String>,
    pub api_key: String,
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeResponse {
    #[serde(default)]
    pub jwt_token: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Remote operation that exchanges an identity for a streaming token.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn subscribe(&self, request: &SubscribeRequest) -> Result<SubscribeResponse>;
}

/// Owns the current credential for one identity.
///
/// Acquisitions are serialized: while one subscribe call is in flight, other
/// callers wait on the lock and then reuse whatever credential it produced.
pub struct AuthManager<S> {
    identity: Identity,
    subscriber: S,
    current: Mutex<Option<Credential>>,
    subscribe_calls: AtomicU64,
}

impl<S: Subscriber> AuthManager<S> {
    pub fn new(identity: Identity, subscriber: S) -> Self {
        Self {
            identity,
            subscriber,
            current: Mutex::new(None),
            subscribe_calls: AtomicU64::new(0),
        }
    }

    /// Start from a credential obtained elsewhere.
    pub fn with_credential(self, credential: Credential) -> Self {
        Self {
            current: Mutex::new(Some(credential)),
            ..self
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Number of subscribe calls issued so far.
    pub fn subscribe_calls(&self) -> u64 {
        self.subscribe_calls.load(Ordering::Relaxed)
    }

    pub async fn current(&self) -> Option<Credential> {
        self.current.lock().await.clone()
    }

    /// Return the held credential, subscribing first if there is none.
    pub async fn acquire(&self) -> Result<Credential> {
        let mut current = self.current.lock().await;
        if let Some(credential) = current.as_ref() {
            return Ok(credential.clone());
        }

        let credential = self.subscribe().await?;
        *current = Some(credential.clone());
        Ok(credential)
    }

    /// Drop `expired` if it is still the held credential. A credential that
    /// has already been replaced is left alone.
    pub async fn invalidate(&self, expired: &Credential) {
        let mut current = self.current.lock().await;
        if current.as_ref() == Some(expired) {
            debug!(token = %expired.redacted(), "Discarding rejected credential");
            *current = None;
        }
    }

    async fn subscribe(&self) -> Result<Credential> {
        let request = SubscribeRequest {
            shop_ids: vec![self.identity.store_id.clone()],
            api_key: self.identity.api_key.clone(),
            token: String::new(),
        };

        self.subscribe_calls.fetch_add(1, Ordering::Relaxed);
        let response = self.subscriber.subscribe(&request).await?;

        if !response.errors.is_empty() {
            warn!(
                store_id = %self.identity.store_id,
                errors = %response.errors.join(", "),
                "Errors subscribing to app logs"
            );
            return Err(AuthError::Rejected(response.errors));
        }

        if response.jwt_token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let credential = Credential::new(response.jwt_token);
        info!(
            store_id = %self.identity.store_id,
            success = response.success,
            "Subscribed to app logs"
        );
        debug!(token = %credential.redacted(), api_key = %self.identity.api_key, "Received streaming token");
        Ok(credential)
    }
}
