// ── Telemetry batcher ──
//
// Collects forwarded readings and submits them as one multi-row write.
// Runs on the line-feed thread; `offer` never waits on the network.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{Span, debug, warn};

use crate::model::{TelemetryReading, TimestampedReading};
use crate::operation::{Operation, TelemetryRow};
use crate::queue::{OperationSink, QueueClosed, Submitter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatcherConfig {
    /// Flush as soon as this many readings are buffered.
    pub max_batch: usize,
    /// Flush a non-empty buffer once this much time has passed since
    /// the last flush.
    pub flush_interval: Duration,
    /// Oldest readings are evicted beyond this while submissions fail.
    pub max_buffered: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            max_batch: 10,
            flush_interval: Duration::from_secs(30),
            max_buffered: 100,
        }
    }
}

pub struct TelemetryBatcher<S: OperationSink = Submitter> {
    sink: S,
    printer_id: String,
    config: BatcherConfig,
    buffer: VecDeque<TimestampedReading>,
    last_flush: Instant,
    span: Span,
}

impl<S: OperationSink> TelemetryBatcher<S> {
    pub fn new(sink: S, printer_id: impl Into<String>, config: BatcherConfig) -> Self {
        let max_batch = config.max_batch.max(1);
        let config = BatcherConfig {
            max_batch,
            max_buffered: config.max_buffered.max(max_batch),
            ..config
        };
        Self {
            sink,
            printer_id: printer_id.into(),
            config,
            buffer: VecDeque::with_capacity(max_batch),
            last_flush: Instant::now(),
            span: tracing::debug_span!("telemetry_batcher"),
        }
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Buffer a reading stamped with the current time.
    ///
    /// Returns `true` if this call flushed the buffer.
    pub fn offer(&mut self, reading: TelemetryReading) -> bool {
        self.offer_timestamped(TimestampedReading::now(reading))
    }

    pub fn offer_timestamped(&mut self, reading: TimestampedReading) -> bool {
        self.buffer.push_back(reading);
        self.enforce_cap();
        if self.buffer.len() >= self.config.max_batch || self.interval_elapsed() {
            return self.flush();
        }
        false
    }

    /// Flush if the time threshold has passed. Call from a timer tick.
    pub fn flush_if_due(&mut self) -> bool {
        if !self.buffer.is_empty() && self.interval_elapsed() {
            return self.flush();
        }
        false
    }

    /// Submit the whole buffer as one write.
    ///
    /// On success the buffer is empty. If the sink rejects the batch the
    /// readings are kept for the next attempt.
    pub fn flush(&mut self) -> bool {
        let _guard = self.span.enter();
        if self.buffer.is_empty() {
            return false;
        }

        let rows: Vec<TelemetryRow> = self
            .buffer
            .iter()
            .map(|r| TelemetryRow {
                printer_id: self.printer_id.clone(),
                telemetry: r.reading.clone(),
                timestamp: r.captured_at,
            })
            .collect();
        let count = rows.len();

        match self.sink.submit(Operation::InsertTelemetry { rows }) {
            Ok(()) => {
                self.buffer.clear();
                self.last_flush = Instant::now();
                debug!(count, "telemetry batch submitted");
                true
            }
            Err(QueueClosed(_)) => {
                warn!(count, "telemetry batch rejected, keeping buffer");
                false
            }
        }
    }

    /// Final flush when the host shuts down.
    pub fn on_shutdown(&mut self) -> bool {
        if self.buffer.is_empty() {
            return false;
        }
        let flushed = self.flush();
        if !flushed {
            let _guard = self.span.enter();
            warn!(lost = self.buffer.len(), "telemetry lost at shutdown");
        }
        flushed
    }

    fn interval_elapsed(&self) -> bool {
        self.last_flush.elapsed() >= self.config.flush_interval
    }

    fn enforce_cap(&mut self) {
        let excess = self.buffer.len().saturating_sub(self.config.max_buffered);
        if excess > 0 {
            self.buffer.drain(..excess);
            let _guard = self.span.enter();
            warn!(evicted = excess, "telemetry buffer full, dropped oldest readings");
        }
    }
}
