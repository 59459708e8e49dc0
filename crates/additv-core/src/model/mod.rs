//! Domain model shared by the decoder, batcher, publisher, and queue.

mod event;
mod job;
mod telemetry;

pub use event::{EventKind, LifecycleEvent};
pub use job::Job;
pub use telemetry::{TelemetryReading, TimestampedReading};
