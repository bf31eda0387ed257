use super::{AppLogEvent, LogStatus};
use serde::Serialize;

const ONE_MILLION: f64 = 1_000_000.0;

/// Summary line shown ahead of each event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayPrefix {
    pub status: String,
    pub source: String,
    /// Fuel in millions of instructions, 4 decimal places. Only set when the
    /// function run reported a counter.
    pub fuel_consumed: Option<String>,
    pub function_id: Option<String>,
    pub log_timestamp: String,
}

impl DisplayPrefix {
    pub fn for_event(event: &AppLogEvent) -> Self {
        let status = match event.status {
            LogStatus::Success => "Success",
            LogStatus::Failure => "Failure",
        };
        let run = event.payload.as_function_run();

        Self {
            status: status.to_string(),
            source: event.source.clone(),
            fuel_consumed: run.and_then(|r| r.fuel_consumed).map(format_fuel),
            function_id: run.and_then(|r| r.function_id.clone()),
            log_timestamp: event.log_timestamp.clone(),
        }
    }
}

/// Format a raw fuel counter as millions of instructions.
pub fn format_fuel(fuel: u64) -> String {
    format!("{:.4}", fuel as f64 / ONE_MILLION)
}
