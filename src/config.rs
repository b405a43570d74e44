use std::time::Duration;

use crate::policy::Policy;

/// Engine configuration.
///
/// `sim_second` is the wall-clock length of one simulated second; the default
/// is real time, tests shrink it so multi-second workloads run in
/// milliseconds.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Initial scheduling policy.
    pub policy: Policy,
    /// Upper bound on continuous simulated execution, in simulated seconds.
    /// `None` disables slicing.
    pub cpu_time_slice: Option<u64>,
    /// How often the scheduler checks the needs-sort flag.
    pub scheduler_tick: Duration,
    /// Dispatcher backoff while the queue is empty.
    pub dispatcher_idle: Duration,
    /// Wall-clock length of one simulated second.
    pub sim_second: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: Policy::Fcfs,
            cpu_time_slice: None,
            scheduler_tick: Duration::from_millis(500),
            dispatcher_idle: Duration::from_millis(100),
            sim_second: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cpu_time_slice(mut self, seconds: u64) -> Self {
        self.cpu_time_slice = Some(seconds);
        self
    }

    pub fn with_scheduler_tick(mut self, tick: Duration) -> Self {
        self.scheduler_tick = tick;
        self
    }

    pub fn with_dispatcher_idle(mut self, idle: Duration) -> Self {
        self.dispatcher_idle = idle;
        self
    }

    pub fn with_sim_second(mut self, sim_second: Duration) -> Self {
        self.sim_second = sim_second;
        self
    }
}
