use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::core::{Job, JobRef, JobSnapshot};
use crate::error::{CsubatchError, Result};
use crate::events::{EventSink, LogLevel, TracingSink};
use crate::metrics::{MetricsObserver, MetricsRecorder};
use crate::policy::Policy;
use crate::queue_manager::QueueManager;
use crate::sched::{Dispatcher, Scheduler};
use crate::state::{JobStateManager, JobStateObserver};

/// Source tag for operator submissions.
pub const SOURCE_SUBMITTER: &str = "Submitter";

/// Ordered view of the queue returned by `Engine::list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueListing {
    pub pending: Vec<JobSnapshot>,
    pub running: Option<JobSnapshot>,
    pub policy: Policy,
}

impl QueueListing {
    /// Pending jobs plus the running one, if any.
    pub fn total(&self) -> usize {
        self.pending.len() + usize::from(self.running.is_some())
    }
}

/// The batch scheduling engine.
///
/// Owns the queue manager, the state manager, the metrics recorder and the
/// two workers. Construct one at program start, call `start` to spawn the
/// worker loops, and `shutdown` to stop them; there is no global instance,
/// collaborators receive the engine by reference.
pub struct Engine {
    queue_manager: Arc<QueueManager>,
    state_manager: Arc<JobStateManager>,
    metrics: Arc<MetricsRecorder>,
    scheduler: Arc<Scheduler>,
    dispatcher: Arc<Dispatcher>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    pub fn with_sink(config: EngineConfig, sink: Arc<dyn EventSink>) -> Self {
        let state_manager = Arc::new(JobStateManager::new(sink.clone()));
        let metrics = Arc::new(MetricsRecorder::new());
        state_manager.subscribe(Arc::new(MetricsObserver::new(metrics.clone())));

        let queue_manager = Arc::new(QueueManager::new(
            state_manager.clone(),
            sink.clone(),
            config.dispatcher_idle,
        ));

        let cancel = CancellationToken::new();
        let scheduler = Arc::new(Scheduler::new(
            queue_manager.clone(),
            config.policy,
            config.scheduler_tick,
            sink.clone(),
            cancel.child_token(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            queue_manager.clone(),
            state_manager.clone(),
            sink.clone(),
            config.cpu_time_slice,
            config.dispatcher_idle,
            config.sim_second,
            cancel.child_token(),
        ));

        Self {
            queue_manager,
            state_manager,
            metrics,
            scheduler,
            dispatcher,
            sink,
            cancel,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the scheduler and dispatcher loops.
    pub fn start(&self) {
        let scheduler = self.scheduler.clone();
        let scheduler_task = tokio::spawn(async move { scheduler.run().await });
        let dispatcher = self.dispatcher.clone();
        let dispatcher_task = tokio::spawn(async move { dispatcher.run().await });

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.push(scheduler_task);
        tasks.push(dispatcher_task);
        self.sink.log(LogLevel::Info, "Engine started");
    }

    /// Cancel the workers, wait for them to exit, and clear the queue.
    /// Idempotent.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.drain(..).collect()
        };
        for task in tasks {
            let _ = task.await;
        }
        self.queue_manager.clear("Engine-Shutdown").await;
        self.sink.log(LogLevel::Info, "Engine stopped");
    }

    /// Submit a new job. The arrival time is stamped here.
    ///
    /// Fails with `InvalidJob` when the name is empty or whitespace, the CPU
    /// time is zero, or a job with the same name is already queued.
    pub async fn submit(&self, name: &str, cpu_time: u64, priority: u32) -> Result<JobRef> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CsubatchError::InvalidJob(
                "job name must not be empty".to_string(),
            ));
        }
        if cpu_time == 0 {
            return Err(CsubatchError::InvalidJob(
                "CPU time must be positive".to_string(),
            ));
        }

        let job = Job::new(name, cpu_time, priority);
        self.queue_manager.add(job.clone(), SOURCE_SUBMITTER).await?;
        self.metrics
            .on_submit(name, cpu_time, priority, job.arrival_time());
        Ok(job)
    }

    /// Ordered snapshot of pending jobs plus the running job, if any.
    pub async fn list(&self) -> QueueListing {
        let pending = self
            .queue_manager
            .snapshot("Engine-List")
            .await
            .iter()
            .map(|job| job.snapshot())
            .collect();
        let running = self.queue_manager.running().await.map(|job| job.snapshot());
        QueueListing {
            pending,
            running,
            policy: self.scheduler.policy(),
        }
    }

    /// Switch the scheduling policy; the queue is re-sorted before this
    /// returns. Returns the previously active policy.
    pub async fn set_policy(&self, policy: Policy) -> Policy {
        self.scheduler.set_policy(policy).await
    }

    pub fn policy(&self) -> Policy {
        self.scheduler.policy()
    }

    /// Remove a pending job by name, cancelling it through the state machine.
    pub async fn remove(&self, name: &str) -> bool {
        self.queue_manager
            .remove_by_name(name, SOURCE_SUBMITTER)
            .await
    }

    pub fn subscribe(&self, observer: Arc<dyn JobStateObserver>) {
        self.state_manager.subscribe(observer);
    }

    pub fn unsubscribe(&self, observer: &Arc<dyn JobStateObserver>) {
        self.state_manager.unsubscribe(observer);
    }

    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        self.metrics.clone()
    }

    pub fn queue_manager(&self) -> Arc<QueueManager> {
        self.queue_manager.clone()
    }

    pub fn state_manager(&self) -> Arc<JobStateManager> {
        self.state_manager.clone()
    }
}
