use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::Instrument;

use stratus_core::{FullMetadata, StorageError, StorageResult, TaskKind, TransferError};

use super::state::{ProgressReporter, TaskShared};
use super::TransferTask;
use crate::retry::{millis, RetryPolicy};

/// What a successful attempt hands back to the driver.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Completed {
    pub(crate) total_bytes: u64,
    pub(crate) metadata: Option<FullMetadata>,
}

/// Settles the task if the driver stops without doing so itself.
struct SettleGuard(Arc<TaskShared>);

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if self
            .0
            .fail(StorageError::Transfer(TransferError::fatal(
                "transfer driver stopped before the task settled",
            )))
        {
            tracing::error!(task_id = %self.0.id(), "Transfer driver stopped unexpectedly");
        }
    }
}

/// Start a transfer task on the current tokio runtime.
///
/// `attempt_fn` is invoked once per attempt with a fresh [`ProgressReporter`].
pub(crate) fn spawn_transfer<F, Fut>(
    kind: TaskKind,
    full_path: String,
    total_bytes: Option<u64>,
    policy: RetryPolicy,
    attempt_fn: F,
) -> StorageResult<TransferTask>
where
    F: FnMut(ProgressReporter) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Completed, TransferError>> + Send + 'static,
{
    let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
        StorageError::Config(format!("transfers require a tokio runtime: {}", e))
    })?;

    let (shared, snapshots, outcome) = TaskShared::new(kind, full_path, total_bytes);
    let span = tracing::info_span!(
        "transfer_task",
        task_id = %shared.id(),
        kind = %kind,
        path = %shared.full_path(),
    );

    tracing::debug!(
        task_id = %shared.id(),
        kind = %kind,
        path = %shared.full_path(),
        ceiling_ms = millis(policy.ceiling),
        "Starting transfer task"
    );
    runtime.spawn(run_attempts(shared.clone(), policy, attempt_fn).instrument(span));

    Ok(TransferTask::new(shared, snapshots, outcome))
}

/// Drive attempts until the task settles.
pub(crate) async fn run_attempts<F, Fut>(
    shared: Arc<TaskShared>,
    policy: RetryPolicy,
    mut attempt_fn: F,
) where
    F: FnMut(ProgressReporter) -> Fut,
    Fut: Future<Output = Result<Completed, TransferError>>,
{
    let _guard = SettleGuard(shared.clone());
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        if !shared.wait_runnable().await {
            return;
        }

        let attempt_start = Instant::now();
        let result = tokio::select! {
            result = attempt_fn(ProgressReporter::new(shared.clone())) => result,
            _ = shared.wait_settled() => {
                tracing::debug!(attempt = attempt + 1, "Transfer settled during attempt");
                return;
            }
        };

        // A finished attempt cannot settle a paused task.
        if !shared.wait_runnable().await {
            return;
        }

        match result {
            Ok(completed) => {
                let total_bytes = completed.total_bytes;
                if shared.succeed(completed.total_bytes, completed.metadata) {
                    tracing::info!(
                        attempts = attempt + 1,
                        bytes = total_bytes,
                        duration_ms = started.elapsed().as_secs_f64() * 1000.0,
                        "Transfer completed"
                    );
                }
                return;
            }
            Err(err) if !err.is_transient() => {
                tracing::warn!(
                    attempt = attempt + 1,
                    status = ?err.status(),
                    error = %err,
                    "Transfer failed with non-transient error"
                );
                shared.fail(StorageError::Transfer(err));
                return;
            }
            Err(err) => {
                let elapsed = started.elapsed();
                let Some(delay) = policy.next_delay(attempt, elapsed) else {
                    tracing::error!(
                        attempts = attempt + 1,
                        elapsed_ms = millis(elapsed),
                        error = %err,
                        "Transfer retry budget exhausted"
                    );
                    shared.fail(StorageError::RetryLimitExceeded {
                        elapsed_ms: millis(elapsed),
                        source: err,
                    });
                    return;
                };

                tracing::warn!(
                    attempt = attempt + 1,
                    attempt_ms = attempt_start.elapsed().as_secs_f64() * 1000.0,
                    delay_ms = millis(delay),
                    error = %err,
                    "Transfer attempt failed, retrying"
                );
                attempt += 1;

                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = shared.wait_settled() => return,
                }
            }
        }
    }
}
