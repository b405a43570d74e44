use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::{JobRef, JobStatus};
use crate::error::CsubatchError;
use crate::events::{EventSink, LogLevel};
use crate::queue_manager::QueueManager;
use crate::state::JobStateManager;

const SOURCE: &str = "Dispatcher";
const SOURCE_TIME_SLICE: &str = "Dispatcher-TimeSlice";

/// The worker that owns the simulated CPU.
///
/// Pops one job at a time, drives it Selected -> Running, sleeps for
/// `min(remaining, slice)` simulated seconds, then either completes the job
/// or decrements its remaining work and re-queues it at the tail. A
/// cancellation observed mid-sleep moves the current job to `Interrupted`
/// and exits the loop.
pub struct Dispatcher {
    queue_manager: Arc<QueueManager>,
    state_manager: Arc<JobStateManager>,
    sink: Arc<dyn EventSink>,
    cpu_time_slice: Option<u64>,
    idle: Duration,
    sim_second: Duration,
    cancel: CancellationToken,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue_manager: Arc<QueueManager>,
        state_manager: Arc<JobStateManager>,
        sink: Arc<dyn EventSink>,
        cpu_time_slice: Option<u64>,
        idle: Duration,
        sim_second: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            queue_manager,
            state_manager,
            sink,
            cpu_time_slice,
            idle,
            sim_second,
            cancel,
        }
    }

    /// Main loop. Runs until `stop` or the cancellation token fires.
    pub async fn run(&self) {
        self.sink.log(LogLevel::Info, "Dispatcher started");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if self.queue_manager.is_empty().await {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.idle) => {}
                }
                continue;
            }

            let job = match self.queue_manager.retrieve(&self.cancel).await {
                Ok(job) => job,
                Err(CsubatchError::Cancelled) => break,
                Err(e) => {
                    self.sink
                        .log(LogLevel::Error, &format!("Error retrieving job from queue: {e}"));
                    tokio::time::sleep(self.idle).await;
                    continue;
                }
            };

            self.execute(job).await;
        }

        self.sink.log(LogLevel::Info, "Dispatcher stopped");
    }

    /// Cooperative stop: the loop exits at its next suspension point, and a
    /// job running at that moment moves to `Interrupted`.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    async fn execute(&self, job: JobRef) {
        if job.status() != JobStatus::Selected {
            if let Err(e) = self.state_manager.update_status(
                &job,
                JobStatus::Selected,
                SOURCE,
                "Job selected for execution",
            ) {
                // Popped job no longer dispatchable, e.g. cancelled between
                // pop and dispatch. Drop it and move on.
                self.sink
                    .log(LogLevel::Warn, &format!("Skipping undispatchable job: {e}"));
                return;
            }
        }

        if let Err(e) = self.state_manager.update_status(
            &job,
            JobStatus::Running,
            SOURCE,
            &format!("Executing job, CPU time: {} seconds", job.cpu_time()),
        ) {
            self.sink
                .log(LogLevel::Warn, &format!("Skipping undispatchable job: {e}"));
            return;
        }
        self.queue_manager.set_running(job.clone()).await;

        let remaining = job.remaining();
        let slice = self.cpu_time_slice.unwrap_or(u64::MAX);
        let seconds = remaining.min(slice);
        self.sink.log_job(
            LogLevel::Debug,
            &job.snapshot(),
            &format!("Simulating execution for {seconds} seconds"),
        );

        let sleep_for = self
            .sim_second
            .saturating_mul(seconds.min(u64::from(u32::MAX)) as u32);
        let interrupted = tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(sleep_for) => false,
        };

        if interrupted {
            let _ = self.state_manager.update_status(
                &job,
                JobStatus::Interrupted,
                SOURCE,
                "Job execution was interrupted",
            );
            self.queue_manager.clear_running().await;
            return;
        }

        if seconds >= remaining {
            job.set_remaining(0);
            if let Err(e) = self.state_manager.update_status(
                &job,
                JobStatus::Completed,
                SOURCE,
                "Job execution completed",
            ) {
                self.sink
                    .log(LogLevel::Warn, &format!("Failed to complete job: {e}"));
            }
            self.queue_manager.clear_running().await;
        } else {
            job.set_remaining(remaining - seconds);
            if let Err(e) = self.state_manager.update_status(
                &job,
                JobStatus::Waiting,
                SOURCE,
                "Job rescheduled after time slice",
            ) {
                self.sink
                    .log(LogLevel::Warn, &format!("Failed to reschedule job: {e}"));
                self.queue_manager.clear_running().await;
                return;
            }
            self.queue_manager.clear_running().await;
            if let Err(e) = self
                .queue_manager
                .reschedule(job.clone(), SOURCE_TIME_SLICE)
                .await
            {
                self.sink.log_job(
                    LogLevel::Error,
                    &job.snapshot(),
                    &format!("Failed to re-queue sliced job: {e}"),
                );
            }
        }
    }
}
