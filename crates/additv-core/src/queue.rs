// ── Operation queue ──
//
// Unbounded FIFO drained by exactly one worker task. Submitting never
// waits on the network; the worker executes one operation at a time so
// backend write order matches submission order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, warn};

use crate::error::OperationError;
use crate::operation::{Backend, Operation};

/// Bounded retry with linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay after attempt `n` is `base_delay * n`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub retry: RetryPolicy,
    /// How long `stop()` waits for the in-flight operation.
    pub drain_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            drain_timeout: Duration::from_secs(5),
        }
    }
}

/// The queue's worker is gone; the rejected operation is handed back.
#[derive(Debug, Error)]
#[error("operation queue is closed, {} rejected", .0.name())]
pub struct QueueClosed(pub Operation);

/// Anything that accepts operations without blocking.
pub trait OperationSink {
    fn submit(&self, op: Operation) -> Result<(), QueueClosed>;
}

/// Count of submitted operations the worker has not finished with.
#[derive(Debug, Default)]
struct Outstanding {
    count: AtomicUsize,
    idle: Notify,
}

impl Outstanding {
    fn begin(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Cloneable submit handle, safe to move across threads.
#[derive(Debug, Clone)]
pub struct Submitter {
    tx: mpsc::UnboundedSender<Operation>,
    outstanding: Arc<Outstanding>,
}

impl OperationSink for Submitter {
    fn submit(&self, op: Operation) -> Result<(), QueueClosed> {
        self.outstanding.begin();
        self.tx.send(op).map_err(|e| {
            self.outstanding.finish();
            QueueClosed(e.0)
        })
    }
}

pub struct OperationQueue {
    submitter: Submitter,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    drain_timeout: Duration,
    span: Span,
}

impl OperationQueue {
    /// Spawn the worker on the current tokio runtime.
    pub fn start<B: Backend>(backend: Arc<B>, config: QueueConfig) -> Self {
        Self::start_in(backend, config, tracing::info_span!("operation_queue"))
    }

    /// Like [`start`](Self::start), logging under the given span.
    pub fn start_in<B: Backend>(backend: Arc<B>, config: QueueConfig, span: Span) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let outstanding = Arc::new(Outstanding::default());
        let worker = Worker {
            backend,
            outstanding: Arc::clone(&outstanding),
            policy: config.retry,
        };
        let handle = tokio::spawn(worker.run(rx, cancel.clone()).instrument(span.clone()));

        Self {
            submitter: Submitter { tx, outstanding },
            cancel,
            worker: Mutex::new(Some(handle)),
            drain_timeout: config.drain_timeout,
            span,
        }
    }

    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    /// Operations submitted but not yet finished, including the one in
    /// flight.
    pub fn pending(&self) -> usize {
        self.submitter.outstanding.count.load(Ordering::Acquire)
    }

    /// Resolve once every submitted operation has completed or been
    /// dropped. Callers bound this with their own timeout.
    pub async fn wait_idle(&self) {
        let outstanding = &self.submitter.outstanding;
        loop {
            let notified = outstanding.idle.notified();
            if outstanding.count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop the worker and wait for the in-flight operation.
    ///
    /// Operations still queued are discarded. Returns `false` when the
    /// drain timeout elapsed first; the worker is then left to finish on
    /// its own.
    pub async fn stop(&self) -> bool {
        self.cancel.cancel();
        let handle = self.worker.lock().expect("worker lock poisoned").take();
        let Some(handle) = handle else {
            return true;
        };

        match tokio::time::timeout(self.drain_timeout, handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                self.span.in_scope(|| error!(error = %e, "queue worker panicked"));
                true
            }
            Err(_) => {
                self.span.in_scope(|| {
                    warn!(
                        timeout_secs = self.drain_timeout.as_secs_f64(),
                        "queue worker did not drain in time"
                    );
                });
                false
            }
        }
    }
}

impl OperationSink for OperationQueue {
    fn submit(&self, op: Operation) -> Result<(), QueueClosed> {
        self.submitter.submit(op)
    }
}

impl Drop for OperationQueue {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Worker ───────────────────────────────────────────────────────────

struct Worker<B> {
    backend: Arc<B>,
    outstanding: Arc<Outstanding>,
    policy: RetryPolicy,
}

impl<B: Backend> Worker<B> {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Operation>, cancel: CancellationToken) {
        debug!("queue worker started");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                op = rx.recv() => {
                    let Some(op) = op else { break };
                    if let Err(e) = execute_with_retry(self.backend.as_ref(), &op, self.policy).await {
                        error!(
                            operation = %e.operation,
                            attempts = e.attempts,
                            error = %e.source,
                            "operation dropped"
                        );
                    }
                    self.outstanding.finish();
                }
            }
        }

        rx.close();
        let mut discarded = 0usize;
        while rx.try_recv().is_ok() {
            discarded += 1;
            self.outstanding.finish();
        }
        if discarded > 0 {
            info!(discarded, "discarded queued operations on stop");
        }
        debug!("queue worker stopped");
    }
}

/// Run one operation under the retry policy.
///
/// Returns the attempt number that succeeded.
pub async fn execute_with_retry<B: Backend>(
    backend: &B,
    op: &Operation,
    policy: RetryPolicy,
) -> Result<u32, OperationError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match backend.execute(op).await {
            Ok(()) => {
                debug!(operation = op.name(), attempt, "operation completed");
                return Ok(attempt);
            }
            Err(source) if attempt >= max_attempts => {
                return Err(OperationError {
                    operation: op.name().to_owned(),
                    attempts: attempt,
                    source,
                });
            }
            Err(e) => {
                warn!(
                    operation = op.name(),
                    attempt,
                    max_attempts,
                    error = %e,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
        }
    }
}
