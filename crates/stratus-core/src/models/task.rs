use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::retry_time::RetryCategory;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Upload,
    Download,
}

impl TaskKind {
    /// Retry ceiling that bounds tasks of this kind.
    pub fn retry_category(&self) -> RetryCategory {
        match self {
            TaskKind::Upload => RetryCategory::Upload,
            TaskKind::Download => RetryCategory::Download,
        }
    }
}

impl Display for TaskKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskKind::Upload => write!(f, "upload"),
            TaskKind::Download => write!(f, "download"),
        }
    }
}

impl FromStr for TaskKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(TaskKind::Upload),
            "download" => Ok(TaskKind::Download),
            _ => Err(anyhow::anyhow!("Invalid task kind: {}", s)),
        }
    }
}

/// Lifecycle of a transfer task.
///
/// `Running -> Paused -> Running` may repeat; `Success`, `Cancelled` and `Error`
/// are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Running,
    Paused,
    Success,
    Cancelled,
    Error,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Success | TaskState::Cancelled | TaskState::Error
        )
    }

    pub fn can_transition_to(&self, next: TaskState) -> bool {
        match (self, next) {
            (TaskState::Running, TaskState::Paused)
            | (TaskState::Running, TaskState::Success)
            | (TaskState::Running, TaskState::Cancelled)
            | (TaskState::Running, TaskState::Error)
            | (TaskState::Paused, TaskState::Running)
            | (TaskState::Paused, TaskState::Cancelled) => true,
            _ => false,
        }
    }
}

impl Display for TaskState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskState::Running => write!(f, "running"),
            TaskState::Paused => write!(f, "paused"),
            TaskState::Success => write!(f, "success"),
            TaskState::Cancelled => write!(f, "cancelled"),
            TaskState::Error => write!(f, "error"),
        }
    }
}

impl FromStr for TaskState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(TaskState::Running),
            "paused" => Ok(TaskState::Paused),
            "success" => Ok(TaskState::Success),
            "cancelled" => Ok(TaskState::Cancelled),
            "error" => Ok(TaskState::Error),
            _ => Err(anyhow::anyhow!("Invalid task state: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TaskState; 5] = [
        TaskState::Running,
        TaskState::Paused,
        TaskState::Success,
        TaskState::Cancelled,
        TaskState::Error,
    ];

    #[test]
    fn terminal_states_never_transition() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn pause_resume_edges() {
        assert!(TaskState::Running.can_transition_to(TaskState::Paused));
        assert!(TaskState::Paused.can_transition_to(TaskState::Running));
        assert!(TaskState::Paused.can_transition_to(TaskState::Cancelled));
        assert!(!TaskState::Paused.can_transition_to(TaskState::Success));
        assert!(!TaskState::Paused.can_transition_to(TaskState::Paused));
    }

    #[test]
    fn display_round_trips() {
        for state in ALL {
            assert_eq!(state.to_string().parse::<TaskState>().unwrap(), state);
        }
        assert!("SUCCESS".parse::<TaskState>().is_err());
        assert_eq!("upload".parse::<TaskKind>().unwrap(), TaskKind::Upload);
    }

    #[test]
    fn kind_selects_retry_category() {
        assert_eq!(TaskKind::Upload.retry_category(), RetryCategory::Upload);
        assert_eq!(TaskKind::Download.retry_category(), RetryCategory::Download);
    }
}
