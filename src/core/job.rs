use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::status::JobStatus;

/// Shared handle to a job. The queue, the running slot, the dispatcher and
/// observers all hold clones of one allocation; the job name is its identity.
pub type JobRef = Arc<Job>;

/// A submitted unit of simulated work.
///
/// Name, CPU time, priority and arrival time are fixed at creation. Only the
/// status mutates, and only through the `JobStateManager`; the remaining-work
/// counter is private to the dispatcher's time-slicing.
#[derive(Debug)]
pub struct Job {
    name: String,
    cpu_time: u64,
    priority: u32,
    arrival_time: DateTime<Utc>,
    status: Mutex<JobStatus>,
    remaining: AtomicU64,
}

impl Job {
    /// Create a job arriving now, in `Waiting` state.
    pub fn new(name: impl Into<String>, cpu_time: u64, priority: u32) -> JobRef {
        Self::with_arrival(name, cpu_time, priority, Utc::now())
    }

    /// Create a job with an explicit arrival timestamp.
    pub fn with_arrival(
        name: impl Into<String>,
        cpu_time: u64,
        priority: u32,
        arrival_time: DateTime<Utc>,
    ) -> JobRef {
        Arc::new(Self {
            name: name.into(),
            cpu_time,
            priority,
            arrival_time,
            status: Mutex::new(JobStatus::Waiting),
            remaining: AtomicU64::new(cpu_time),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Simulated seconds of work this job requires.
    pub fn cpu_time(&self) -> u64 {
        self.cpu_time
    }

    /// Smaller value = higher priority.
    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn arrival_time(&self) -> DateTime<Utc> {
        self.arrival_time
    }

    pub fn arrival_millis(&self) -> i64 {
        self.arrival_time.timestamp_millis()
    }

    pub fn status(&self) -> JobStatus {
        *self.lock_status()
    }

    pub(crate) fn lock_status(&self) -> MutexGuard<'_, JobStatus> {
        // A poisoned status lock only means a panicking holder; the enum
        // itself is always valid, so recover the guard.
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulated seconds of work still to run. Decremented by the dispatcher
    /// on each time slice.
    pub(crate) fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Acquire)
    }

    pub(crate) fn set_remaining(&self, seconds: u64) {
        self.remaining.store(seconds, Ordering::Release);
    }

    /// Read-only view of the job for listings and log context.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            name: self.name.clone(),
            cpu_time: self.cpu_time,
            priority: self.priority,
            arrival_time: self.arrival_time,
            status: self.status(),
        }
    }
}

/// Serializable point-in-time view of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub name: String,
    pub cpu_time: u64,
    pub priority: u32,
    pub arrival_time: DateTime<Utc>,
    pub status: JobStatus,
}
