// ── Event publisher ──

use serde_json::{Map, Value};
use tracing::{Span, debug, trace, warn};

use crate::model::{EventKind, LifecycleEvent};
use crate::operation::{EventRow, Operation};
use crate::queue::{OperationSink, Submitter};

/// Turns host lifecycle events into single-row event writes.
pub struct EventPublisher<S: OperationSink = Submitter> {
    sink: S,
    printer_id: String,
    span: Span,
}

impl<S: OperationSink> EventPublisher<S> {
    pub fn new(sink: S, printer_id: impl Into<String>) -> Self {
        Self {
            sink,
            printer_id: printer_id.into(),
            span: tracing::debug_span!("event_publisher"),
        }
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Publish a host event by name. Unknown names are dropped.
    pub fn publish(&self, host_event: &str, payload: Map<String, Value>) -> bool {
        match EventKind::from_host_event(host_event) {
            Some(kind) => self.publish_kind(kind, payload),
            None => {
                self.span.in_scope(|| trace!(event = host_event, "ignoring untracked event"));
                false
            }
        }
    }

    pub fn publish_event(&self, event: LifecycleEvent) -> bool {
        self.publish_kind(event.kind, event.payload)
    }

    pub fn publish_kind(&self, kind: EventKind, payload: Map<String, Value>) -> bool {
        let _guard = self.span.enter();
        let row = EventRow {
            printer_id: self.printer_id.clone(),
            event: kind,
            payload,
        };
        match self.sink.submit(Operation::InsertEvent(row)) {
            Ok(()) => {
                debug!(event = %kind, "event queued");
                true
            }
            Err(e) => {
                warn!(event = %kind, error = %e, "event not queued");
                false
            }
        }
    }

    /// Queue a progress update for a job, clamped to 0–100.
    pub fn publish_job_progress(&self, job_id: &str, percent: f64) -> bool {
        let _guard = self.span.enter();
        if !percent.is_finite() {
            warn!(job_id, percent, "ignoring non-finite job progress");
            return false;
        }
        let op = Operation::UpdateJobProgress {
            job_id: job_id.to_owned(),
            progress: percent.clamp(0.0, 100.0),
        };
        match self.sink.submit(op) {
            Ok(()) => true,
            Err(e) => {
                warn!(job_id, error = %e, "job progress not queued");
                false
            }
        }
    }
}
