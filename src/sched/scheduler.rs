use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::events::{EventSink, LogLevel};
use crate::policy::Policy;
use crate::queue_manager::QueueManager;

/// Background reorderer: keeps the pending sequence sorted under the active
/// policy without forcing the dispatcher to sort on every pop.
///
/// The queue manager's needs-sort flag is the handshake: submitters and the
/// dispatcher set it, the scheduler clears it by sorting. A policy change
/// sorts synchronously so the first subsequent pop observes the new ordering;
/// the tick loop picks up everything else.
pub struct Scheduler {
    queue_manager: Arc<QueueManager>,
    policy: RwLock<Policy>,
    tick: Duration,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        queue_manager: Arc<QueueManager>,
        initial_policy: Policy,
        tick: Duration,
        sink: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            queue_manager,
            policy: RwLock::new(initial_policy),
            tick,
            sink,
            cancel,
        }
    }

    pub fn policy(&self) -> Policy {
        *self.policy.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Switch the active policy. A no-op when `policy` is already active;
    /// otherwise the queue is re-sorted before this returns. Returns the
    /// previously active policy.
    pub async fn set_policy(&self, policy: Policy) -> Policy {
        let previous = {
            let mut current = self.policy.write().unwrap_or_else(|e| e.into_inner());
            let previous = *current;
            *current = policy;
            previous
        };

        if previous != policy {
            self.queue_manager.set_needs_sort(true);
            self.sort_if_needed().await;
            self.sink.log(
                LogLevel::Info,
                &format!("Scheduling policy changed to {policy}"),
            );
        }
        previous
    }

    /// Sort the pending sequence when the needs-sort flag is set.
    pub async fn sort_if_needed(&self) {
        if !self.queue_manager.needs_sort() {
            return;
        }
        let policy = self.policy();
        self.queue_manager.sort_pending(policy).await;
        self.sink
            .log(LogLevel::Debug, &format!("Job queue sorted with policy {policy}"));
    }

    /// Tick loop. Runs until `stop` or the cancellation token fires.
    pub async fn run(&self) {
        self.sink.log(
            LogLevel::Info,
            &format!("Scheduler started with policy {}", self.policy()),
        );

        let mut tick = tokio::time::interval(self.tick);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tick.tick() => self.sort_if_needed().await,
            }
        }

        self.sink.log(LogLevel::Info, "Scheduler stopped");
    }

    /// Cooperative stop: the loop exits at its next suspension point.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}
