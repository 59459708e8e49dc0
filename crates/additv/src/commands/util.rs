//! Shared helpers: connecting, one-shot delivery, and queue draining.

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use additv_config::SessionStore;
use additv_core::queue::execute_with_retry;
use additv_core::{
    ConnectionManager, Operation, OperationQueue, OperationSink, QueueClosed, RetryPolicy,
    Session,
};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;

/// A verified session plus what error reporting needs.
pub struct Bridge {
    pub session: Arc<Session>,
    pub store: Arc<SessionStore>,
}

impl Bridge {
    pub fn settings_path(&self) -> String {
        self.store.path().display().to_string()
    }

    pub fn url(&self) -> String {
        self.session.client().base_url().to_string()
    }
}

pub async fn connect(global: &GlobalOpts) -> Result<Bridge, CliError> {
    let store = config::open_store(global)?;
    let manager = ConnectionManager::new(Arc::clone(&store), config::transport(global));
    let settings = store.settings();
    let session = manager
        .connect(&settings)
        .await
        .map_err(|e| CliError::from_connection(e, &store.path().display().to_string()))?;
    Ok(Bridge {
        session,
        store,
    })
}

/// Collects operations so a one-shot command can deliver them inline.
#[derive(Default)]
pub struct Collected(RefCell<Vec<Operation>>);

impl OperationSink for &Collected {
    fn submit(&self, op: Operation) -> Result<(), QueueClosed> {
        self.0.borrow_mut().push(op);
        Ok(())
    }
}

impl Collected {
    /// Execute every collected operation under the queue's retry policy.
    pub async fn deliver(self, bridge: &Bridge) -> Result<usize, CliError> {
        let ops = self.0.into_inner();
        let count = ops.len();
        for op in &ops {
            execute_with_retry(bridge.session.as_ref(), op, RetryPolicy::default())
                .await
                .map_err(|e| CliError::from_operation(e, &bridge.url()))?;
        }
        Ok(count)
    }
}

/// Wait for the queue to empty, then stop it.
///
/// Returns `false` if operations were still pending when `window`
/// elapsed.
pub async fn drain(queue: &OperationQueue, window: Duration) -> bool {
    let drained = tokio::time::timeout(window, queue.wait_idle()).await.is_ok();
    if !drained {
        tracing::warn!(pending = queue.pending(), "queue not drained before shutdown");
    }
    queue.stop().await && drained
}
