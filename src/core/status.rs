use serde::{Deserialize, Serialize};

/// Lifecycle states of a job inside the engine.
///
/// `Completed`, `Interrupted` and `Canceled` are terminal: once a job reaches
/// one of them its status never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Waiting,
    Selected,
    Running,
    Completed,
    Interrupted,
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Interrupted | JobStatus::Canceled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Waiting => write!(f, "waiting"),
            JobStatus::Selected => write!(f, "selected"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Interrupted => write!(f, "interrupted"),
            JobStatus::Canceled => write!(f, "canceled"),
        }
    }
}
