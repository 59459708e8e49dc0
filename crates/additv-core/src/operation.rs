// ── Queued backend writes ──
//
// Every deferred write is a tagged variant with a typed payload,
// executed by the queue worker through `Backend::execute`.

use std::future::Future;

use additv_api::BackendClient;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::model::{EventKind, TelemetryReading};

pub const EVENTS_TABLE: &str = "printer_events";
pub const TELEMETRY_TABLE: &str = "printer_telemetry";
pub const JOBS_TABLE: &str = "jobs";

/// One row of the `printer_events` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRow {
    pub printer_id: String,
    pub event: EventKind,
    pub payload: Map<String, Value>,
}

/// One row of the `printer_telemetry` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRow {
    pub printer_id: String,
    pub telemetry: TelemetryReading,
    pub timestamp: DateTime<Utc>,
}

/// A deferred backend write.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    InsertEvent(EventRow),
    /// A whole telemetry batch, written as one multi-row insert.
    InsertTelemetry { rows: Vec<TelemetryRow> },
    UpdateJobProgress { job_id: String, progress: f64 },
}

impl Operation {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InsertEvent(_) => "insert_event",
            Self::InsertTelemetry { .. } => "insert_telemetry",
            Self::UpdateJobProgress { .. } => "update_job_progress",
        }
    }
}

/// Executes operations against a backend.
///
/// Implemented by [`BackendClient`]; tests substitute scripted fakes.
pub trait Backend: Send + Sync + 'static {
    fn execute(&self, op: &Operation) -> impl Future<Output = Result<(), additv_api::Error>> + Send;
}

impl Backend for BackendClient {
    async fn execute(&self, op: &Operation) -> Result<(), additv_api::Error> {
        match op {
            Operation::InsertEvent(row) => self.insert(EVENTS_TABLE, row).await,
            Operation::InsertTelemetry { rows } => self.insert(TELEMETRY_TABLE, rows).await,
            Operation::UpdateJobProgress { job_id, progress } => {
                self.update(
                    JOBS_TABLE,
                    &json!({ "progress": progress }),
                    &[("id", job_id.as_str())],
                )
                .await
            }
        }
    }
}
