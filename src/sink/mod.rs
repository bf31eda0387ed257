pub mod file_writer;
pub mod json;
pub mod terminal;

pub use file_writer::{LogFileWriter, PersistingSink, WriteError};
pub use json::JsonLinesSink;
pub use terminal::TextSink;

use crate::payload::{AppLogEvent, DisplayPrefix};

/// Consumer of a session's output.
///
/// Calls arrive from the session loop in order; events come in bursts
/// separated by irregular delays.
pub trait Sink: Send {
    fn on_event(&mut self, event: &AppLogEvent, prefix: &DisplayPrefix);

    /// Recoverable condition worth showing, such as a retry countdown.
    fn on_status(&mut self, message: &str);

    /// The session is ending because of `message`.
    fn on_fatal(&mut self, message: &str);
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn on_event(&mut self, event: &AppLogEvent, prefix: &DisplayPrefix) {
        (**self).on_event(event, prefix)
    }

    fn on_status(&mut self, message: &str) {
        (**self).on_status(message)
    }

    fn on_fatal(&mut self, message: &str) {
        (**self).on_fatal(message)
    }
}

/// Render a JSON value for people. Strings holding JSON documents are
/// re-indented; other strings are returned as-is.
pub fn pretty_print_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => match serde_json::from_str::<serde_json::Value>(s) {
            Ok(inner @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
                serde_json::to_string_pretty(&inner).unwrap_or_else(|_| s.clone())
            }
            _ => s.clone(),
        },
        serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Notification {
        Event { cursor: String, prefix: DisplayPrefix },
        Status(String),
        Fatal(String),
    }

    /// Sink that records every call; clones share the same log.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingSink {
        pub log: Arc<Mutex<Vec<Notification>>>,
    }

    impl RecordingSink {
        pub(crate) fn notifications(&self) -> Vec<Notification> {
            self.log.lock().unwrap().clone()
        }

        pub(crate) fn event_cursors(&self) -> Vec<String> {
            self.notifications()
                .into_iter()
                .filter_map(|n| match n {
                    Notification::Event { cursor, .. } => Some(cursor),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn statuses(&self) -> Vec<String> {
            self.notifications()
                .into_iter()
                .filter_map(|n| match n {
                    Notification::Status(s) => Some(s),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn fatals(&self) -> Vec<String> {
            self.notifications()
                .into_iter()
                .filter_map(|n| match n {
                    Notification::Fatal(s) => Some(s),
                    _ => None,
                })
                .collect()
        }
    }

    impl Sink for RecordingSink {
        fn on_event(&mut self, event: &AppLogEvent, prefix: &DisplayPrefix) {
            self.log.lock().unwrap().push(Notification::Event {
                cursor: event.cursor.clone(),
                prefix: prefix.clone(),
            });
        }

        fn on_status(&mut self, message: &str) {
            self.log.lock().unwrap().push(Notification::Status(message.to_string()));
        }

        fn on_fatal(&mut self, message: &str) {
            self.log.lock().unwrap().push(Notification::Fatal(message.to_string()));
        }
    }

    #[test]
    fn test_pretty_print_json_string_document() {
        let pretty = pretty_print_json(&json!(r#"{"a":1}"#));
        assert_eq!(pretty, "{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_pretty_print_json_plain_values() {
        assert_eq!(pretty_print_json(&json!("just text")), "just text");
        assert_eq!(pretty_print_json(&json!("42")), "42");
        assert_eq!(pretty_print_json(&json!(7)), "7");
        assert_eq!(pretty_print_json(&json!(null)), "");
        assert_eq!(pretty_print_json(&json!([1])), "[\n  1\n]");
    }

    #[test]
    fn test_boxed_sink_forwards() {
        let recorder = RecordingSink::default();
        let mut boxed: Box<dyn Sink> = Box::new(recorder.clone());
        boxed.on_status("hello");
        boxed.on_fatal("bye");
        assert_eq!(recorder.statuses(), vec!["hello".to_string()]);
        assert_eq!(recorder.fatals(), vec!["bye".to_string()]);
    }
}
