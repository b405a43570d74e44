use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::{JobQueue, JobRef, JobStatus};
use crate::error::{CsubatchError, Result};
use crate::events::{EventSink, LogLevel};
use crate::policy::Policy;
use crate::state::JobStateManager;

/// Source tag used by the scheduler's own sort operations. Mutations carrying
/// this tag do not re-set the needs-sort flag.
pub const SOURCE_SCHEDULER_SORT: &str = "Scheduler-Sort";

const SOURCE: &str = "QueueManager";

/// Single-writer facade over the job queue.
///
/// This is the only component holding the queue mutex and the needs-sort
/// flag; the scheduler, the dispatcher and submitters all go through it. The
/// mutex guards each operation's critical section and is never held across a
/// sleep: `retrieve` polls with a quick check under the lock, then releases
/// and backs off.
pub struct QueueManager {
    queue: Mutex<JobQueue>,
    needs_sort: AtomicBool,
    state_manager: Arc<JobStateManager>,
    sink: Arc<dyn EventSink>,
    retrieve_poll: Duration,
}

impl QueueManager {
    pub fn new(
        state_manager: Arc<JobStateManager>,
        sink: Arc<dyn EventSink>,
        retrieve_poll: Duration,
    ) -> Self {
        Self {
            queue: Mutex::new(JobQueue::new()),
            needs_sort: AtomicBool::new(false),
            state_manager,
            sink,
            retrieve_poll,
        }
    }

    /// Append a job to the tail of the pending sequence.
    ///
    /// A job arriving in a non-`Waiting` state is coerced back to `Waiting`
    /// through the state manager first; jobs in a terminal state are refused
    /// because that coercion is not a legal transition. Duplicate names are
    /// refused. Sets the needs-sort flag unless `source` is the scheduler's
    /// sort.
    pub async fn add(&self, job: JobRef, source: &str) -> Result<()> {
        self.insert(job, source, "added to queue").await
    }

    /// Re-append a job that already passed through the engine (time-sliced
    /// remainder). Same contract as `add`.
    pub async fn reschedule(&self, job: JobRef, source: &str) -> Result<()> {
        self.insert(job, source, "rescheduled").await
    }

    async fn insert(&self, job: JobRef, source: &str, verb: &str) -> Result<()> {
        if job.status() != JobStatus::Waiting {
            self.state_manager.update_status(
                &job,
                JobStatus::Waiting,
                SOURCE,
                &format!("Job {verb} by {source}"),
            )?;
        }

        let accepted = {
            let mut queue = self.queue.lock().await;
            queue.push_back(job.clone())
        };
        if !accepted {
            self.sink.log_job(
                LogLevel::Warn,
                &job.snapshot(),
                &format!("Duplicate job refused by queue (from {source})"),
            );
            return Err(CsubatchError::InvalidJob(format!(
                "job '{}' is already queued",
                job.name()
            )));
        }

        if source != SOURCE_SCHEDULER_SORT {
            self.needs_sort.store(true, Ordering::SeqCst);
        }
        self.sink.log_job(
            LogLevel::Info,
            &job.snapshot(),
            &format!("Job {verb} by {source}"),
        );
        Ok(())
    }

    /// Remove and return the head of the pending sequence, blocking until a
    /// job is available or `cancel` fires.
    ///
    /// Two-phase: quick poll under the lock, release, cancellable backoff,
    /// retry. The lock is never held while sleeping.
    pub async fn retrieve(&self, cancel: &CancellationToken) -> Result<JobRef> {
        loop {
            {
                let mut queue = self.queue.lock().await;
                if let Some(job) = queue.poll_head() {
                    return Ok(job);
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(CsubatchError::Cancelled),
                _ = tokio::time::sleep(self.retrieve_poll) => {}
            }
        }
    }

    /// Remove the first pending job with this name and cancel it through the
    /// state machine. Returns whether a job was removed.
    pub async fn remove_by_name(&self, name: &str, source: &str) -> bool {
        let removed = {
            let mut queue = self.queue.lock().await;
            queue.remove_by_name(name)
        };
        match removed {
            Some(job) => {
                if source != SOURCE_SCHEDULER_SORT {
                    self.needs_sort.store(true, Ordering::SeqCst);
                }
                let _ = self.state_manager.update_status(
                    &job,
                    JobStatus::Canceled,
                    SOURCE,
                    &format!("Job removed from queue by {source}"),
                );
                true
            }
            None => false,
        }
    }

    /// Remove a specific job (by identity, i.e. name). See `remove_by_name`.
    pub async fn remove(&self, job: &JobRef, source: &str) -> bool {
        self.remove_by_name(job.name(), source).await
    }

    pub async fn get_by_name(&self, name: &str) -> Option<JobRef> {
        let queue = self.queue.lock().await;
        let result = queue.iter().find(|j| j.name() == name).cloned();
        result
    }

    /// Ordered copy of the pending sequence.
    pub async fn snapshot(&self, source: &str) -> Vec<JobRef> {
        let jobs = {
            let queue = self.queue.lock().await;
            queue.snapshot()
        };
        self.sink.log(
            LogLevel::Debug,
            &format!("Retrieved {} jobs for {source}", jobs.len()),
        );
        jobs
    }

    /// Atomically replace the pending contents, preserving the given order.
    pub async fn replace_all(&self, jobs: Vec<JobRef>, source: &str) {
        {
            let mut queue = self.queue.lock().await;
            queue.replace_all(jobs);
        }
        if source != SOURCE_SCHEDULER_SORT {
            self.needs_sort.store(true, Ordering::SeqCst);
        }
    }

    /// Stable-sort the pending sequence under `policy` in one critical
    /// section. This is the scheduler's sort path: a snapshot/replace pair
    /// would lose a job added between the two calls.
    pub async fn sort_pending(&self, policy: Policy) {
        // Clear the flag before sorting so a mutation racing the sort re-flags
        // the queue for the next tick.
        self.needs_sort.store(false, Ordering::SeqCst);
        let mut queue = self.queue.lock().await;
        queue.sort_pending_by(|a, b| policy.compare(a, b));
    }

    pub async fn clear(&self, source: &str) {
        {
            let mut queue = self.queue.lock().await;
            queue.clear();
        }
        if source != SOURCE_SCHEDULER_SORT {
            self.needs_sort.store(true, Ordering::SeqCst);
        }
        self.sink
            .log(LogLevel::Info, &format!("Job queue cleared by {source}"));
    }

    /// Pending job with the smallest CPU time.
    pub async fn get_shortest(&self) -> Option<JobRef> {
        let queue = self.queue.lock().await;
        queue.iter().min_by_key(|j| j.cpu_time()).cloned()
    }

    /// Pending job with the smallest priority value.
    pub async fn get_highest_priority(&self) -> Option<JobRef> {
        let queue = self.queue.lock().await;
        queue.iter().min_by_key(|j| j.priority()).cloned()
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }

    pub fn needs_sort(&self) -> bool {
        self.needs_sort.load(Ordering::SeqCst)
    }

    pub fn set_needs_sort(&self, value: bool) {
        self.needs_sort.store(value, Ordering::SeqCst);
    }

    pub async fn set_running(&self, job: JobRef) {
        self.queue.lock().await.set_running(job);
    }

    pub async fn clear_running(&self) {
        self.queue.lock().await.clear_running();
    }

    pub async fn running(&self) -> Option<JobRef> {
        self.queue.lock().await.running()
    }
}
