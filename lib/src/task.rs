use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::process_helper::ExitStatus;

/// Why a task reached a terminal state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TerminalReason {
    /// The process ran to completion and returned this exit code.
    Exited(i32),
    /// The process was terminated by this signal number.
    Signaled(i32),
    /// The process could never be spawned in the first place.
    FailedToSpawn(String),
}

impl From<ExitStatus> for TerminalReason {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Code(code) => TerminalReason::Exited(code),
            ExitStatus::Signal(signal) => TerminalReason::Signaled(signal),
        }
    }
}

/// The task's lifecycle state.
///
/// `Paused` carries the `runnable` flag distinguishing "was Active, got suspended" (runnable:
/// true, eligible for admission ahead of any Queued task) from "was admitted Queued-to-Paused
/// directly"; that distinction is what drives the admission order ahead of a plain Queued task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Active { pid: u32 },
    Paused { pid: u32, runnable: bool },
    Terminal(TerminalReason),
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Terminal(_))
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Active { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, TaskStatus::Paused { .. })
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, TaskStatus::Queued)
    }

    pub fn pid(&self) -> Option<u32> {
        match self {
            TaskStatus::Active { pid } => Some(*pid),
            TaskStatus::Paused { pid, .. } => Some(*pid),
            _ => None,
        }
    }
}

/// One submitted unit of work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub id: usize,
    pub command: Vec<String>,
    pub submitter: String,
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
    pub stdout_path: Option<PathBuf>,
    pub stderr_path: Option<PathBuf>,
    pub status: TaskStatus,
    pub submitted_at: DateTime<Local>,
}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        command: Vec<String>,
        submitter: String,
        cwd: PathBuf,
        env: HashMap<String, String>,
        stdout_path: Option<PathBuf>,
        stderr_path: Option<PathBuf>,
        submitted_at: DateTime<Local>,
    ) -> Task {
        Task {
            id,
            command,
            submitter,
            cwd,
            env,
            stdout_path,
            stderr_path,
            status: TaskStatus::Queued,
            submitted_at,
        }
    }
}
