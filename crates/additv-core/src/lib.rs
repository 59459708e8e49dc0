//! Delivery pipeline and telemetry decoding between a printer host and
//! the Additv backend.
//!
//! - **[`ConnectionManager`]**: Establishes a [`Session`] with the stored
//!   access key, refreshing once on failure. Verifies the principal and
//!   persists every rotated token pair.
//!
//! - **[`OperationQueue`]**: Unbounded FIFO of typed [`Operation`]s with
//!   a single worker task. Each operation gets up to three attempts with
//!   linear backoff; exhausted operations are logged and dropped.
//!
//! - **[`TelemetryDecoder`]**: Stateful parser for the controller's
//!   status lines. Correlates temperature and fan reports per
//!   [`TelemetryProfile`] and drops readings that fail the significance
//!   filter.
//!
//! - **[`TelemetryBatcher`]**: Buffers forwarded readings and submits
//!   them as one multi-row write on size, time, or shutdown.
//!
//! - **[`EventPublisher`]**: Maps host lifecycle events onto
//!   [`EventKind`]s and queues one row per event.
//!
//! The decoder and batcher run on the caller's thread and never block;
//! the queue's [`Submitter`] is the only handle that crosses threads.

pub mod batcher;
pub mod connection;
pub mod decoder;
pub mod error;
pub mod model;
pub mod operation;
pub mod publisher;
pub mod queue;

// ── Primary re-exports ──────────────────────────────────────────────
pub use batcher::{BatcherConfig, TelemetryBatcher};
pub use connection::{ConnectionManager, Session};
pub use decoder::{TelemetryDecoder, TelemetryProfile};
pub use error::{ConnectionError, CoreError, FieldError, OperationError};
pub use model::{EventKind, Job, LifecycleEvent, TelemetryReading, TimestampedReading};
pub use operation::{Backend, EventRow, Operation, TelemetryRow};
pub use publisher::EventPublisher;
pub use queue::{OperationQueue, OperationSink, QueueClosed, QueueConfig, RetryPolicy, Submitter};
