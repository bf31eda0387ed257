use super::Sink;
use crate::payload::{AppLogEvent, AppLogPayload, DisplayPrefix, LogStatus};
use serde::Serialize;
use std::io::Write;
use tracing::{error, warn};

/// Line-delimited JSON output, one object per event. Status and fatal
/// messages go to the log so the stream stays parseable.
pub struct JsonLinesSink<W> {
    out: W,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: &'a str,
    status: LogStatus,
    source: &'a str,
    source_namespace: &'a str,
    log_type: &'a str,
    cursor: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fuel_consumed: Option<&'a str>,
    payload: &'a AppLogPayload,
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Sink for JsonLinesSink<W> {
    fn on_event(&mut self, event: &AppLogEvent, prefix: &DisplayPrefix) {
        let line = JsonLine {
            timestamp: &event.log_timestamp,
            status: event.status,
            source: &event.source,
            source_namespace: &event.source_namespace,
            log_type: &event.log_type,
            cursor: &event.cursor,
            fuel_consumed: prefix.fuel_consumed.as_deref(),
            payload: &event.payload,
        };

        let result = serde_json::to_writer(&mut self.out, &line)
            .map_err(std::io::Error::from)
            .and_then(|_| writeln!(self.out))
            .and_then(|_| self.out.flush());
        if let Err(e) = result {
            warn!(error = %e, "Failed to write JSON log line");
        }
    }

    fn on_status(&mut self, message: &str) {
        warn!(status = %message, "Log stream status");
    }

    fn on_fatal(&mut self, message: &str) {
        error!(error = %message, "Log stream stopped");
    }
}
