use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use crate::core::{JobRef, JobStatus};
use crate::error::{CsubatchError, Result};
use crate::events::{EventSink, LogLevel};

/// Record of one job status change, delivered synchronously to observers.
#[derive(Debug, Clone)]
pub struct JobStateEvent {
    pub job: JobRef,
    pub old_status: JobStatus,
    pub new_status: JobStatus,
    pub source: String,
    pub message: String,
}

pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Component notified of job state changes.
///
/// Callbacks run on the thread that performed the transition and must not
/// block indefinitely. Failures (an `Err` or a panic) are isolated: they are
/// reported through the event sink and affect neither the transition nor the
/// other observers.
pub trait JobStateObserver: Send + Sync {
    fn on_job_state_changed(&self, event: &JobStateEvent) -> std::result::Result<(), ObserverError>;
}

/// Central owner of the job status state machine.
///
/// Every status write in the engine goes through `update_status`, which
/// validates the transition against the state table, applies it, and
/// publishes a `JobStateEvent` to all registered observers.
pub struct JobStateManager {
    observers: RwLock<Vec<Arc<dyn JobStateObserver>>>,
    sink: Arc<dyn EventSink>,
}

impl JobStateManager {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
            sink,
        }
    }

    /// Apply a status transition to `job`.
    ///
    /// Rejected transitions leave the job untouched, emit one warn-level sink
    /// event and return `InvalidTransition`; no observer is notified.
    pub fn update_status(
        &self,
        job: &JobRef,
        new_status: JobStatus,
        source: &str,
        message: &str,
    ) -> Result<()> {
        let old_status = {
            let mut status = job.lock_status();
            let old = *status;
            if !transition_allowed(old, new_status) {
                drop(status);
                self.sink.log_job(
                    LogLevel::Warn,
                    &job.snapshot(),
                    &format!("Invalid status transition {old} -> {new_status} attempted by {source}"),
                );
                return Err(CsubatchError::InvalidTransition {
                    job: job.name().to_string(),
                    from: old,
                    to: new_status,
                });
            }
            *status = new_status;
            old
        };

        self.sink
            .log_job(LogLevel::Info, &job.snapshot(), &format!("{message} (by {source})"));

        let event = JobStateEvent {
            job: job.clone(),
            old_status,
            new_status,
            source: source.to_string(),
            message: message.to_string(),
        };
        self.notify(&event);
        Ok(())
    }

    pub fn subscribe(&self, observer: Arc<dyn JobStateObserver>) {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(|e| e.into_inner());
        if !observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            observers.push(observer);
        }
    }

    pub fn unsubscribe(&self, observer: &Arc<dyn JobStateObserver>) {
        self.observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|o| !Arc::ptr_eq(o, observer));
    }

    /// Deliver `event` to a snapshot of the registration list, so observers
    /// added or removed during notification do not affect the in-flight event.
    fn notify(&self, event: &JobStateEvent) {
        let observers: Vec<Arc<dyn JobStateObserver>> = self
            .observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        for observer in observers {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| observer.on_job_state_changed(event)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.sink.log(
                    LogLevel::Warn,
                    &format!("Observer error handling event for job {}: {e}", event.job.name()),
                ),
                Err(_) => self.sink.log(
                    LogLevel::Warn,
                    &format!("Observer panicked handling event for job {}", event.job.name()),
                ),
            }
        }
    }
}

/// The state table. Everything else is rejected; terminal states have no
/// outgoing transitions.
fn transition_allowed(from: JobStatus, to: JobStatus) -> bool {
    use JobStatus::*;
    match from {
        Waiting => matches!(to, Selected | Canceled),
        Selected => matches!(to, Running | Waiting | Canceled),
        Running => matches!(to, Waiting | Completed | Interrupted | Canceled),
        Completed | Interrupted | Canceled => false,
    }
}
