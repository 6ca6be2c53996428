use crate::common::error::Result;
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};

/// Receives exactly one record per orchestration operation, on every exit
/// path, successful or not.
pub trait OutcomeReporter: Send + Sync {
    fn report(&self, operation: &str, started: SystemTime, duration: Duration, outcome: &Result<()>);
}

/// Reports operation outcomes to the log.
pub struct LogReporter;

impl OutcomeReporter for LogReporter {
    fn report(
        &self,
        operation: &str,
        _started: SystemTime,
        duration: Duration,
        outcome: &Result<()>,
    ) {
        match outcome {
            Ok(()) => info!(
                %operation,
                duration = %humantime::format_duration(duration),
                "Operation succeeded"
            ),
            Err(failure) => error!(
                %operation,
                duration = %humantime::format_duration(duration),
                %failure,
                "Operation failed"
            ),
        }
    }
}

/// The serialized form of one operation outcome.
#[derive(Serialize)]
struct OutcomeRecord<'a> {
    operation: &'a str,
    started_unix_secs: u64,
    duration_secs: f64,
    succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
}

/// Writes one JSON line per operation outcome to standard output, for
/// machine-readable harness bookkeeping.
pub struct JsonReporter;

impl OutcomeReporter for JsonReporter {
    fn report(&self, operation: &str, started: SystemTime, duration: Duration, outcome: &Result<()>) {
        let record = OutcomeRecord {
            operation,
            started_unix_secs: started
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            duration_secs: duration.as_secs_f64(),
            succeeded: outcome.is_ok(),
            failure: outcome.as_ref().err().map(ToString::to_string),
        };

        match serde_json::to_string(&record) {
            Ok(line) => println!("{line}"),
            Err(error) => warn!(%error, "Failed to serialize outcome record"),
        }
    }
}
