use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{Job, JobRef};
use crate::error::CsubatchError;

/// The total order used to arrange pending jobs.
///
/// Each variant resolves to a pure comparator; adding a policy is a local
/// change to the `compare` match. Ties always fall back to arrival time, and
/// sorting is stable, so submission order survives equal keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Policy {
    /// First come, first served: ascending arrival time.
    #[default]
    Fcfs,
    /// Shortest job first: ascending CPU time.
    Sjf,
    /// Smaller priority value runs earlier.
    Priority,
}

impl Policy {
    pub fn compare(self, a: &Job, b: &Job) -> Ordering {
        match self {
            Policy::Fcfs => a.arrival_time().cmp(&b.arrival_time()),
            Policy::Sjf => a
                .cpu_time()
                .cmp(&b.cpu_time())
                .then_with(|| a.arrival_time().cmp(&b.arrival_time())),
            Policy::Priority => a
                .priority()
                .cmp(&b.priority())
                .then_with(|| a.arrival_time().cmp(&b.arrival_time())),
        }
    }
}

/// Stable sort of a job sequence under the given policy.
pub fn sort_jobs(jobs: &mut [JobRef], policy: Policy) {
    jobs.sort_by(|a, b| policy.compare(a, b));
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Policy::Fcfs => write!(f, "FCFS"),
            Policy::Sjf => write!(f, "SJF"),
            Policy::Priority => write!(f, "PRIORITY"),
        }
    }
}

impl FromStr for Policy {
    type Err = CsubatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fcfs" => Ok(Policy::Fcfs),
            "sjf" => Ok(Policy::Sjf),
            "priority" => Ok(Policy::Priority),
            other => Err(CsubatchError::InvalidPolicy(other.to_string())),
        }
    }
}
