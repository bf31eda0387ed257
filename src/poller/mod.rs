pub mod poll_client;

pub use poll_client::{PollClient, PollError};

use crate::auth::Credential;
use crate::payload::{decode_value, AppLogEvent, DecodeError};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

/// Server-side filters, fixed for a whole session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub status: Option<String>,
    pub source: Option<String>,
}

impl Filters {
    pub fn new(status: Option<String>, source: Option<String>) -> Self {
        Self { status, source }
    }
}

/// Records and position returned by one successful poll.
#[derive(Debug, Default)]
pub struct PollBatch {
    /// Decoded events in server order.
    pub events: Vec<AppLogEvent>,
    /// Records that could not be decoded and were skipped.
    pub decode_errors: Vec<DecodeError>,
    /// New stream position, if the server sent one.
    pub cursor: Option<String>,
    /// Error strings the server attached to an otherwise successful response.
    pub errors: Vec<String>,
}

/// Classified result of one poll attempt.
#[derive(Debug)]
pub enum PollOutcome {
    Success(PollBatch),
    AuthExpired,
    Throttled { message: String },
    TransientServerError { message: String },
    FatalError { message: String },
}

/// Remote operation that fetches records after a cursor.
#[async_trait]
pub trait LogPoller: Send + Sync {
    async fn poll(&self, credential: &Credential, cursor: &str, filters: &Filters) -> PollOutcome;
}

#[derive(Debug, Deserialize)]
struct PollResponseBody {
    #[serde(default)]
    app_logs: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    errors: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    errors: Vec<String>,
}

/// Query parameters for a poll. Without a cursor the request asks for the
/// server's default window and filters are left out.
pub fn query_params(cursor: &str, filters: &Filters) -> Vec<(&'static str, String)> {
    if cursor.is_empty() {
        return Vec::new();
    }

    let mut params = vec![("cursor", cursor.to_string())];
    if let Some(status) = filters.status.as_deref().filter(|s| !s.is_empty()) {
        params.push(("status", status.to_string()));
    }
    if let Some(source) = filters.source.as_deref().filter(|s| !s.is_empty()) {
        params.push(("source", source.to_string()));
    }
    params
}

/// Decode a 2xx body. Records are decoded one by one; a bad record lands in
/// `decode_errors` and the rest of the batch is kept.
pub fn parse_success_body(body: &str) -> Result<PollBatch, serde_json::Error> {
    let parsed: PollResponseBody = serde_json::from_str(body)?;
    let mut batch = PollBatch {
        cursor: parsed.cursor.filter(|c| !c.is_empty()),
        errors: parsed.errors.unwrap_or_default(),
        ..PollBatch::default()
    };

    for record in parsed.app_logs.unwrap_or_default() {
        match decode_value(record) {
            Ok(event) => batch.events.push(event),
            Err(e) => {
                warn!(error = %e, "Skipping undecodable log record");
                batch.decode_errors.push(e);
            }
        }
    }

    Ok(batch)
}

/// Classify a non-2xx response. The body may be `{"errors": [...]}` or free text.
pub fn classify_status(status: u16, reason: &str, body: &str) -> PollOutcome {
    let message = error_message(status, reason, body);
    match status {
        401 => PollOutcome::AuthExpired,
        429 => PollOutcome::Throttled { message },
        s if s >= 500 => PollOutcome::TransientServerError { message },
        _ => PollOutcome::FatalError {
            message: format!("{} while fetching app logs", message),
        },
    }
}

fn error_message(status: u16, reason: &str, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if !parsed.errors.is_empty() {
            return parsed.errors.join(", ");
        }
    }

    let text = body.trim();
    if text.is_empty() {
        format!("{}: {}", status, reason)
    } else {
        format!("{}: {}", status, text)
    }
}
