use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metadata::FullMetadata;
use super::task::{TaskKind, TaskState};

/// Point-in-time view of a transfer task. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub task_id: Uuid,
    pub kind: TaskKind,
    pub state: TaskState,
    pub full_path: String,
    pub bytes_transferred: u64,
    /// Unknown for downloads until the transport reports the object size.
    pub total_bytes: Option<u64>,
    /// Populated once an upload succeeds.
    pub metadata: Option<FullMetadata>,
}

impl TaskSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Fraction of the transfer completed, when the total is known.
    pub fn progress(&self) -> Option<f64> {
        match self.total_bytes {
            Some(0) => Some(1.0),
            Some(total) => Some(self.bytes_transferred as f64 / total as f64),
            None => None,
        }
    }
}
