//! Transfer tasks
//!
//! A [`TransferTask`] tracks one upload or download. Progress and completion are
//! two decoupled channels: [`TransferTask::progress`] yields every snapshot in
//! order and ends after the terminal one, while awaiting the task resolves once
//! with the final snapshot or the failure that settled it.

mod driver;
mod state;

pub(crate) use driver::{spawn_transfer, Completed};
pub use state::ProgressReporter;

use futures::future::BoxFuture;
use futures::Stream;
use std::future::IntoFuture;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use uuid::Uuid;

use stratus_core::{StorageError, StorageResult, TaskKind, TaskSnapshot, TaskState, TransferError};

use state::{OutcomeReceiver, SnapshotReceiver, TaskShared};

/// An in-flight or settled transfer, owned by the caller that started it.
///
/// Dropping the task does not cancel it; call [`TransferTask::cancel`] first.
pub struct TransferTask {
    shared: Arc<TaskShared>,
    snapshots: Option<SnapshotReceiver>,
    outcome: OutcomeReceiver,
}

impl TransferTask {
    pub(crate) fn new(
        shared: Arc<TaskShared>,
        snapshots: SnapshotReceiver,
        outcome: OutcomeReceiver,
    ) -> Self {
        Self {
            shared,
            snapshots: Some(snapshots),
            outcome,
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id()
    }

    pub fn kind(&self) -> TaskKind {
        self.shared.kind()
    }

    /// The task's current fields.
    pub fn snapshot(&self) -> TaskSnapshot {
        self.shared.snapshot()
    }

    pub fn state(&self) -> TaskState {
        self.shared.state()
    }

    /// Pause a running task. Returns `false` if it was not running.
    pub fn pause(&self) -> bool {
        self.shared.pause()
    }

    /// Resume a paused task. Returns `false` if it was not paused.
    pub fn resume(&self) -> bool {
        self.shared.resume()
    }

    /// Cancel a running or paused task. Returns `false` if it had already settled.
    ///
    /// Cancellation is cooperative: bytes already in flight may still reach the
    /// backend, but no snapshot follows the cancelled one.
    pub fn cancel(&self) -> bool {
        self.shared.cancel()
    }

    /// A cloneable control handle, usable while the task itself is being awaited.
    pub fn handle(&self) -> TaskHandle {
        TaskHandle {
            shared: self.shared.clone(),
        }
    }

    /// Take the progress stream. Returns `None` after the first call.
    ///
    /// The stream starts with the task's initial snapshot, even if taken late.
    pub fn progress(&mut self) -> Option<SnapshotStream> {
        self.snapshots.take().map(|rx| SnapshotStream { rx })
    }

    /// Wait for the task to settle.
    ///
    /// An untaken progress stream is closed first so unread snapshots do not
    /// accumulate while waiting.
    pub async fn outcome(self) -> StorageResult<TaskSnapshot> {
        let TransferTask {
            shared: _,
            snapshots,
            outcome,
        } = self;
        drop(snapshots);
        outcome.await.unwrap_or_else(|_| {
            Err(StorageError::Transfer(TransferError::fatal(
                "transfer task dropped without settling",
            )))
        })
    }
}

impl IntoFuture for TransferTask {
    type Output = StorageResult<TaskSnapshot>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.outcome())
    }
}

impl std::fmt::Debug for TransferTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferTask")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("state", &self.state())
            .finish()
    }
}

/// Control handle for a [`TransferTask`].
#[derive(Clone)]
pub struct TaskHandle {
    shared: Arc<TaskShared>,
}

impl TaskHandle {
    pub fn id(&self) -> Uuid {
        self.shared.id()
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        self.shared.snapshot()
    }

    pub fn state(&self) -> TaskState {
        self.shared.state()
    }

    pub fn pause(&self) -> bool {
        self.shared.pause()
    }

    pub fn resume(&self) -> bool {
        self.shared.resume()
    }

    pub fn cancel(&self) -> bool {
        self.shared.cancel()
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle").field("id", &self.id()).finish()
    }
}

/// Snapshots of one task, ending after the terminal snapshot.
pub struct SnapshotStream {
    rx: SnapshotReceiver,
}

impl Stream for SnapshotStream {
    type Item = TaskSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn task(total: Option<u64>) -> TransferTask {
        let (shared, snapshots, outcome) =
            TaskShared::new(TaskKind::Upload, "photos/cat.png".to_string(), total);
        TransferTask::new(shared, snapshots, outcome)
    }

    fn reporter(task: &TransferTask) -> ProgressReporter {
        ProgressReporter::new(task.shared.clone())
    }

    #[tokio::test]
    async fn initial_snapshot_is_running() {
        let mut task = task(Some(10));
        let mut progress = task.progress().unwrap();
        let first = progress.next().await.unwrap();
        assert_eq!(first.state, TaskState::Running);
        assert_eq!(first.bytes_transferred, 0);
        assert_eq!(first.total_bytes, Some(10));
        assert_eq!(first.full_path, "photos/cat.png");
        assert!(task.progress().is_none());
    }

    #[test]
    fn pause_and_resume_edges() {
        let task = task(Some(10));
        assert!(!task.resume());
        assert!(task.pause());
        assert!(!task.pause());
        assert_eq!(task.state(), TaskState::Paused);
        assert!(task.resume());
        assert_eq!(task.state(), TaskState::Running);
    }

    #[tokio::test]
    async fn cancel_settles_with_cancelled() {
        let mut task = task(Some(10));
        let mut progress = task.progress().unwrap();
        assert!(task.pause());
        assert!(task.cancel());
        assert!(!task.cancel());
        assert!(!task.resume());

        let states: Vec<TaskState> = progress.by_ref().map(|s| s.state).collect().await;
        assert_eq!(
            states,
            vec![TaskState::Running, TaskState::Paused, TaskState::Cancelled]
        );
        assert!(task.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_clamped() {
        let mut task = task(Some(10));
        let mut progress = task.progress().unwrap();
        let first_attempt = reporter(&task);
        assert!(first_attempt.report(4));
        assert!(first_attempt.report(3));

        // A retry restarts from zero; the task keeps its high-water mark.
        let second_attempt = reporter(&task);
        assert!(second_attempt.report(5));
        assert!(second_attempt.report(9));
        assert_eq!(task.snapshot().bytes_transferred, 10);

        assert!(task.shared.succeed(10, None));
        assert!(!second_attempt.report(1));

        let bytes: Vec<u64> = progress.by_ref().map(|s| s.bytes_transferred).collect().await;
        assert_eq!(bytes, vec![0, 4, 7, 10, 10]);
        let last = task.await.unwrap();
        assert_eq!(last.state, TaskState::Success);
        assert_eq!(last.total_bytes, Some(10));
    }

    #[tokio::test]
    async fn paused_progress_is_recorded_silently() {
        let mut task = task(None);
        let mut progress = task.progress().unwrap();
        let reporter = reporter(&task);
        reporter.set_total(8);
        task.pause();
        assert!(reporter.report(3));
        assert_eq!(task.snapshot().bytes_transferred, 3);
        task.cancel();

        let snapshots: Vec<TaskSnapshot> = progress.by_ref().collect().await;
        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[1].bytes_transferred, 0);
        assert_eq!(snapshots[2].bytes_transferred, 3);
        assert_eq!(snapshots[2].total_bytes, Some(8));
    }

    #[tokio::test]
    async fn ready_waits_for_resume() {
        let task = task(Some(1));
        let reporter = reporter(&task);
        task.pause();

        let waiter = tokio::spawn(async move { reporter.ready().await });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        task.resume();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn ready_reports_cancellation() {
        let task = task(Some(1));
        let reporter = reporter(&task);
        task.pause();
        let handle = task.handle();

        let waiter = tokio::spawn(async move { reporter.ready().await });
        handle.cancel();
        assert!(!waiter.await.unwrap());
    }

    #[tokio::test]
    async fn awaiting_closes_untaken_progress_stream() {
        let task = task(Some(100_000));
        let shared = task.shared.clone();
        let reporter = reporter(&task);
        assert!(shared.has_snapshot_receiver());

        let waiter = tokio::spawn(task.into_future());
        for _ in 0..10 {
            if !shared.has_snapshot_receiver() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!shared.has_snapshot_receiver());

        for _ in 0..100_000 {
            assert!(reporter.report(1));
        }
        assert!(shared.succeed(100_000, None));
        assert_eq!(waiter.await.unwrap().unwrap().bytes_transferred, 100_000);
    }

    #[tokio::test]
    async fn taken_progress_stream_stays_open_while_awaiting() {
        let mut task = task(Some(2));
        let shared = task.shared.clone();
        let mut progress = task.progress().unwrap();

        let waiter = tokio::spawn(task.into_future());
        tokio::task::yield_now().await;
        assert!(shared.has_snapshot_receiver());

        assert!(shared.succeed(2, None));
        let states: Vec<TaskState> = progress.by_ref().map(|s| s.state).collect().await;
        assert_eq!(states, vec![TaskState::Running, TaskState::Success]);
        assert!(waiter.await.unwrap().is_ok());
    }

    #[test]
    fn failure_carries_cause() {
        let task = task(Some(1));
        assert!(task
            .shared
            .fail(StorageError::Transfer(TransferError::fatal("denied"))));
        assert!(!task.shared.succeed(1, None));
        assert_eq!(task.state(), TaskState::Error);
    }
}
