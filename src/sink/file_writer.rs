use super::Sink;
use crate::payload::{AppLogEvent, DisplayPrefix};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize log record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid log timestamp '{0}'")]
    Timestamp(String),
}

pub type Result<T> = std::result::Result<T, WriteError>;

/// Writes each record to its own pretty-printed JSON file:
/// `{root}/{identity}/{YYYYMMDD_HHMMSS_mmmZ}_{namespace}_{source}_{suffix}.json`.
#[derive(Debug, Clone)]
pub struct LogFileWriter {
    dir: PathBuf,
}

impl LogFileWriter {
    pub fn new(root: &Path, identity: &str) -> Self {
        Self {
            dir: root.join(sanitize(identity)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, event: &AppLogEvent) -> Result<PathBuf> {
        let timestamp = DateTime::parse_from_rfc3339(&event.log_timestamp)
            .map_err(|_| WriteError::Timestamp(event.log_timestamp.clone()))?
            .with_timezone(&Utc);

        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(6).collect();
        let file_name = format!(
            "{}_{}_{}_{}.json",
            format_timestamp_for_filename(&timestamp),
            sanitize(&event.source_namespace),
            sanitize(&event.source),
            suffix
        );

        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        let contents = serde_json::to_string_pretty(event)?;
        std::fs::write(&path, contents)?;

        debug!(path = %path.display(), "Wrote log record");
        Ok(path)
    }
}

fn format_timestamp_for_filename(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y%m%d_%H%M%S_%3fZ").to_string()
}

/// Keep file name components inside their directory.
fn sanitize(component: &str) -> String {
    // Empty or all-dot names refer to the current or parent directory
    if component.chars().all(|c| c == '.') {
        return "_".to_string();
    }
    component
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect()
}

/// Persists every event before handing it to the wrapped sink. Write
/// failures are reported as status messages and never stop the stream.
pub struct PersistingSink<S> {
    inner: S,
    writer: LogFileWriter,
}

impl<S: Sink> PersistingSink<S> {
    pub fn new(inner: S, writer: LogFileWriter) -> Self {
        Self { inner, writer }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Sink> Sink for PersistingSink<S> {
    fn on_event(&mut self, event: &AppLogEvent, prefix: &DisplayPrefix) {
        if let Err(e) = self.writer.write(event) {
            warn!(error = %e, cursor = %event.cursor, "Failed to persist log record");
            self.inner
                .on_status(&format!("Error while writing log to file: {}", e));
        }
        self.inner.on_event(event, prefix);
    }

    fn on_status(&mut self, message: &str) {
        self.inner.on_status(message);
    }

    fn on_fatal(&mut self, message: &str) {
        self.inner.on_fatal(message);
    }
}
