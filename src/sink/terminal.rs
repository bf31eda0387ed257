use super::{pretty_print_json, Sink};
use crate::payload::{AppLogEvent, AppLogPayload, DisplayPrefix};
use chrono::{DateTime, Utc};
use console::style;
use std::io::Write;
use tracing::warn;

/// Human-readable output, one block per event.
pub struct TextSink<W> {
    out: W,
    styled: bool,
}

impl TextSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout(), console::colors_enabled())
    }
}

impl<W: Write + Send> TextSink<W> {
    pub fn new(out: W, styled: bool) -> Self {
        Self { out, styled }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render_event(&self, event: &AppLogEvent, prefix: &DisplayPrefix) -> String {
        let status = if prefix.status == "Success" {
            style(prefix.status.as_str()).green()
        } else {
            style(prefix.status.as_str()).red()
        }
        .force_styling(self.styled);

        let mut header = format!(
            "{} {} {}",
            style(display_timestamp(&prefix.log_timestamp))
                .green()
                .force_styling(self.styled),
            style(prefix.source.as_str())
                .blue()
                .bright()
                .force_styling(self.styled),
            status,
        );
        if let Some(function_id) = &prefix.function_id {
            header.push_str(&format!(" {}", function_id));
        }
        if let Some(fuel) = &prefix.fuel_consumed {
            header.push_str(&format!(" in {} M instructions", fuel));
        }

        let mut lines = vec![header];
        match &event.payload {
            AppLogPayload::FunctionRun(run) => {
                if !run.logs.is_empty() {
                    lines.push(run.logs.trim_end().to_string());
                }
                let error = match (&run.error_type, &run.error_message) {
                    (Some(kind), Some(message)) => Some(format!("{}: {}", kind, message)),
                    (None, Some(message)) => Some(format!("Error: {}", message)),
                    (Some(kind), None) => Some(kind.clone()),
                    (None, None) => None,
                };
                if let Some(error) = error {
                    lines.push(style(error).red().force_styling(self.styled).to_string());
                }
                lines.push(format!("Input ({} bytes):", run.input_bytes));
                lines.push(pretty_print_json(&run.input));
                lines.push(format!("Output ({} bytes):", run.output_bytes));
                lines.push(pretty_print_json(&run.output));
            }
            AppLogPayload::Opaque(payload) => {
                lines.push(format!("{} ({}):", event.log_type, event.source_namespace));
                lines.push(pretty_print_json(payload));
            }
        }

        lines.join("\n")
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{}", line).and_then(|_| self.out.flush()) {
            warn!(error = %e, "Failed to write log output");
        }
    }
}

impl<W: Write + Send> Sink for TextSink<W> {
    fn on_event(&mut self, event: &AppLogEvent, prefix: &DisplayPrefix) {
        let rendered = self.render_event(event, prefix);
        self.write_line(&rendered);
        self.write_line("");
    }

    fn on_status(&mut self, message: &str) {
        let line = style(message).yellow().force_styling(self.styled).to_string();
        self.write_line(&line);
    }

    fn on_fatal(&mut self, message: &str) {
        let line = style(format!("Error: {}", message))
            .red()
            .bold()
            .force_styling(self.styled)
            .to_string();
        self.write_line(&line);
    }
}

/// `2024-05-23 19:17:00.240` for RFC 3339 input; anything else is shown verbatim.
fn display_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts
            .with_timezone(&Utc)
            .format("%Y-%m-%d %H:%M:%S%.3f")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}
