use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

use stratus_core::{FullMetadata, StorageError, StorageResult, TaskKind, TaskSnapshot, TaskState};

pub(crate) type SnapshotReceiver = mpsc::UnboundedReceiver<TaskSnapshot>;
pub(crate) type OutcomeReceiver = oneshot::Receiver<StorageResult<TaskSnapshot>>;

/// State shared between a task's driver, its owner and any handles.
///
/// All transitions go through the mutex so that the snapshot emitted for a
/// transition always reflects it, and no snapshot follows the terminal one.
pub(crate) struct TaskShared {
    id: Uuid,
    kind: TaskKind,
    full_path: String,
    inner: Mutex<TaskInner>,
    control: watch::Sender<TaskState>,
}

struct TaskInner {
    state: TaskState,
    bytes_transferred: u64,
    total_bytes: Option<u64>,
    metadata: Option<FullMetadata>,
    events: Option<mpsc::UnboundedSender<TaskSnapshot>>,
    outcome: Option<oneshot::Sender<StorageResult<TaskSnapshot>>>,
}

impl TaskShared {
    /// Create a running task and emit its initial snapshot.
    pub(crate) fn new(
        kind: TaskKind,
        full_path: String,
        total_bytes: Option<u64>,
    ) -> (Arc<Self>, SnapshotReceiver, OutcomeReceiver) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (control, _) = watch::channel(TaskState::Running);

        let shared = Arc::new(Self {
            id: Uuid::new_v4(),
            kind,
            full_path,
            inner: Mutex::new(TaskInner {
                state: TaskState::Running,
                bytes_transferred: 0,
                total_bytes,
                metadata: None,
                events: Some(events_tx),
                outcome: Some(outcome_tx),
            }),
            control,
        });
        shared.emit(&shared.lock());

        (shared, events_rx, outcome_rx)
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn kind(&self) -> TaskKind {
        self.kind
    }

    pub(crate) fn full_path(&self) -> &str {
        &self.full_path
    }

    fn lock(&self) -> MutexGuard<'_, TaskInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot_of(&self, inner: &TaskInner) -> TaskSnapshot {
        TaskSnapshot {
            task_id: self.id,
            kind: self.kind,
            state: inner.state,
            full_path: self.full_path.clone(),
            bytes_transferred: inner.bytes_transferred,
            total_bytes: inner.total_bytes,
            metadata: inner.metadata.clone(),
        }
    }

    fn emit(&self, inner: &TaskInner) {
        if let Some(events) = &inner.events {
            // The owner may have dropped the stream; progress is then unobserved.
            let _ = events.send(self.snapshot_of(inner));
        }
    }

    pub(crate) fn snapshot(&self) -> TaskSnapshot {
        self.snapshot_of(&self.lock())
    }

    pub(crate) fn state(&self) -> TaskState {
        self.lock().state
    }

    pub(crate) fn pause(&self) -> bool {
        self.transition(TaskState::Paused)
    }

    pub(crate) fn resume(&self) -> bool {
        self.transition(TaskState::Running)
    }

    fn transition(&self, next: TaskState) -> bool {
        let mut inner = self.lock();
        if !inner.state.can_transition_to(next) {
            return false;
        }
        inner.state = next;
        self.emit(&inner);
        self.control.send_replace(next);
        true
    }

    pub(crate) fn cancel(&self) -> bool {
        let inner = self.lock();
        if !inner.state.can_transition_to(TaskState::Cancelled) {
            return false;
        }
        self.settle(inner, TaskState::Cancelled, Some(StorageError::Cancelled));
        true
    }

    pub(crate) fn succeed(&self, total_bytes: u64, metadata: Option<FullMetadata>) -> bool {
        let mut inner = self.lock();
        if !inner.state.can_transition_to(TaskState::Success) {
            return false;
        }
        inner.total_bytes = Some(total_bytes);
        inner.bytes_transferred = total_bytes;
        inner.metadata = metadata;
        self.settle(inner, TaskState::Success, None);
        true
    }

    pub(crate) fn fail(&self, error: StorageError) -> bool {
        let inner = self.lock();
        if !inner.state.can_transition_to(TaskState::Error) {
            return false;
        }
        self.settle(inner, TaskState::Error, Some(error));
        true
    }

    fn settle(
        &self,
        mut inner: MutexGuard<'_, TaskInner>,
        state: TaskState,
        error: Option<StorageError>,
    ) {
        inner.state = state;
        let snapshot = self.snapshot_of(&inner);

        // Dropping the sender ends the progress stream after the final snapshot.
        if let Some(events) = inner.events.take() {
            let _ = events.send(snapshot.clone());
        }
        if let Some(outcome) = inner.outcome.take() {
            let _ = outcome.send(match error {
                Some(error) => Err(error),
                None => Ok(snapshot),
            });
        }
        self.control.send_replace(state);
    }

    /// Record the cumulative byte count of the current attempt.
    ///
    /// `bytes_transferred` is a high-water mark across attempts, so a retry
    /// that re-sends earlier ranges never moves it backwards. Returns `false`
    /// once the task has settled.
    pub(crate) fn record_progress(&self, attempt_bytes: u64) -> bool {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return false;
        }

        let mut bytes = attempt_bytes.max(inner.bytes_transferred);
        if let Some(total) = inner.total_bytes {
            bytes = bytes.min(total);
        }
        if bytes > inner.bytes_transferred {
            inner.bytes_transferred = bytes;
            if inner.state == TaskState::Running {
                self.emit(&inner);
            }
        }
        true
    }

    /// Whether anyone is still receiving snapshots.
    #[cfg(test)]
    pub(crate) fn has_snapshot_receiver(&self) -> bool {
        self.lock()
            .events
            .as_ref()
            .is_some_and(|events| !events.is_closed())
    }

    pub(crate) fn set_total(&self, total_bytes: u64) {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return;
        }
        inner.total_bytes = Some(total_bytes.max(inner.bytes_transferred));
    }

    /// Wait until the task is not paused. Returns `true` if it is running.
    pub(crate) async fn wait_runnable(&self) -> bool {
        let mut control = self.control.subscribe();
        let runnable = match control.wait_for(|state| *state != TaskState::Paused).await {
            Ok(state) => *state == TaskState::Running,
            Err(_) => false,
        };
        runnable
    }

    /// Resolves once the task has reached a terminal state.
    pub(crate) async fn wait_settled(&self) {
        let mut control = self.control.subscribe();
        let _ = control.wait_for(TaskState::is_terminal).await;
    }
}

/// Progress sink handed to a [`Transport`](crate::Transport) for one attempt.
///
/// Byte counts are cumulative within the attempt; a retry gets a fresh
/// reporter starting at zero.
#[derive(Clone)]
pub struct ProgressReporter {
    shared: Arc<TaskShared>,
    attempt_bytes: Arc<AtomicU64>,
}

impl ProgressReporter {
    pub(crate) fn new(shared: Arc<TaskShared>) -> Self {
        Self {
            shared,
            attempt_bytes: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn task_id(&self) -> Uuid {
        self.shared.id()
    }

    /// Record the object size once it is known.
    pub fn set_total(&self, total_bytes: u64) {
        self.shared.set_total(total_bytes);
    }

    /// Record `delta` more bytes moved by this attempt.
    ///
    /// Returns `false` once the task has settled; the transport should stop.
    pub fn report(&self, delta: u64) -> bool {
        let attempt_bytes = self
            .attempt_bytes
            .fetch_add(delta, Ordering::Relaxed)
            .saturating_add(delta);
        self.shared.record_progress(attempt_bytes)
    }

    pub fn attempt_bytes(&self) -> u64 {
        self.attempt_bytes.load(Ordering::Relaxed)
    }

    /// Wait while the task is paused.
    ///
    /// Transports call this between chunks. Returns `false` if the task settled
    /// (for example, it was cancelled) and the transfer should be abandoned.
    pub async fn ready(&self) -> bool {
        self.shared.wait_runnable().await
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("task_id", &self.shared.id())
            .field("attempt_bytes", &self.attempt_bytes())
            .finish()
    }
}
