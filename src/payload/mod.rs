pub mod prefix;

pub use prefix::{format_fuel, DisplayPrefix};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Record type tag carried by function execution records.
pub const LOG_TYPE_FUNCTION_RUN: &str = "function_run";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed log record: {0}")]
    Record(#[source] serde_json::Error),

    #[error("malformed {log_type} payload at cursor '{cursor}': {source}")]
    Payload {
        log_type: String,
        cursor: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, DecodeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Failure,
}

/// A log record exactly as the poll endpoint returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLogRecord {
    #[serde(default)]
    pub shop_id: i64,
    #[serde(default)]
    pub api_client_id: i64,
    /// JSON document serialized into a string.
    pub payload: String,
    pub log_type: String,
    pub source: String,
    #[serde(default)]
    pub source_namespace: String,
    #[serde(default)]
    pub cursor: String,
    pub status: LogStatus,
    pub log_timestamp: String,
}

/// Payload of a `function_run` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRunLog {
    #[serde(default)]
    pub input: serde_json::Value,
    #[serde(default)]
    pub input_bytes: u64,
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default)]
    pub output_bytes: u64,
    #[serde(default)]
    pub logs: String,
    #[serde(default)]
    pub function_id: Option<String>,
    #[serde(default)]
    pub invocation_id: Option<String>,
    /// Raw instruction count; divide by one million for display. Absent on
    /// some failed runs.
    #[serde(default)]
    pub fuel_consumed: Option<u64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
}

/// Decoded payload, keyed by the record's `log_type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AppLogPayload {
    FunctionRun(FunctionRunLog),
    /// Any record type this client does not model. The payload is kept as parsed JSON.
    Opaque(serde_json::Value),
}

impl AppLogPayload {
    pub fn as_function_run(&self) -> Option<&FunctionRunLog> {
        match self {
            AppLogPayload::FunctionRun(run) => Some(run),
            AppLogPayload::Opaque(_) => None,
        }
    }
}

/// A record whose payload has been decoded. Record metadata is carried along
/// so sinks can render or persist it without the raw record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppLogEvent {
    pub shop_id: i64,
    pub api_client_id: i64,
    pub log_type: String,
    pub source: String,
    pub source_namespace: String,
    pub cursor: String,
    pub status: LogStatus,
    pub log_timestamp: String,
    pub payload: AppLogPayload,
}

/// Decode a raw record's payload according to its record type.
pub fn decode(raw: RawLogRecord) -> Result<AppLogEvent> {
    let payload = if raw.log_type == LOG_TYPE_FUNCTION_RUN {
        serde_json::from_str::<FunctionRunLog>(&raw.payload).map(AppLogPayload::FunctionRun)
    } else {
        serde_json::from_str::<serde_json::Value>(&raw.payload).map(AppLogPayload::Opaque)
    }
    .map_err(|source| DecodeError::Payload {
        log_type: raw.log_type.clone(),
        cursor: raw.cursor.clone(),
        source,
    })?;

    Ok(AppLogEvent {
        shop_id: raw.shop_id,
        api_client_id: raw.api_client_id,
        log_type: raw.log_type,
        source: raw.source,
        source_namespace: raw.source_namespace,
        cursor: raw.cursor,
        status: raw.status,
        log_timestamp: raw.log_timestamp,
        payload,
    })
}

/// Decode a record that has not yet been checked against the record shape.
pub fn decode_value(value: serde_json::Value) -> Result<AppLogEvent> {
    let raw: RawLogRecord = serde_json::from_value(value).map_err(DecodeError::Record)?;
    decode(raw)
}
