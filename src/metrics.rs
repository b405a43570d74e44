use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::JobStatus;
use crate::state::{JobStateEvent, JobStateObserver, ObserverError};

/// Per-job performance record, keyed by job name.
///
/// `start_millis` is 0 until the job first runs; `completion_millis` is 0
/// until it completes. The derived fields satisfy
/// `turnaround = wait + actual_cpu`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetrics {
    pub name: String,
    pub cpu_time: u64,
    pub priority: u32,
    pub arrival_millis: i64,
    pub start_millis: i64,
    pub completion_millis: i64,
    pub wait_millis: i64,
    pub actual_cpu_millis: i64,
    pub turnaround_millis: i64,
}

impl JobMetrics {
    fn new(name: &str, cpu_time: u64, priority: u32, arrival: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            cpu_time,
            priority,
            arrival_millis: arrival.timestamp_millis(),
            start_millis: 0,
            completion_millis: 0,
            wait_millis: 0,
            actual_cpu_millis: 0,
            turnaround_millis: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completion_millis > 0
    }
}

/// Aggregates per-job timestamps into system-wide performance numbers.
///
/// Safe for concurrent invocation; updates referencing an unknown job name
/// are silently ignored.
pub struct MetricsRecorder {
    records: Mutex<HashMap<String, JobMetrics>>,
    total_completed: AtomicU64,
    total_submitted: AtomicU64,
    system_start: DateTime<Utc>,
    last_reset_millis: AtomicI64,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            records: Mutex::new(HashMap::new()),
            total_completed: AtomicU64::new(0),
            total_submitted: AtomicU64::new(0),
            system_start: now,
            last_reset_millis: AtomicI64::new(now.timestamp_millis()),
        }
    }

    fn lock_records(&self) -> MutexGuard<'_, HashMap<String, JobMetrics>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create (or overwrite) the record for a submitted job.
    pub fn on_submit(&self, name: &str, cpu_time: u64, priority: u32, arrival: DateTime<Utc>) {
        self.lock_records()
            .insert(name.to_string(), JobMetrics::new(name, cpu_time, priority, arrival));
        self.total_submitted.fetch_add(1, Ordering::SeqCst);
    }

    /// Record the moment a job starts executing.
    pub fn on_start(&self, name: &str, t: DateTime<Utc>) {
        if let Some(record) = self.lock_records().get_mut(name) {
            record.start_millis = t.timestamp_millis();
            record.wait_millis = record.start_millis - record.arrival_millis;
        }
    }

    /// Record the moment a job completes and derive its aggregates.
    pub fn on_completion(&self, name: &str, t: DateTime<Utc>) {
        let recorded = {
            let mut records = self.lock_records();
            match records.get_mut(name) {
                Some(record) => {
                    record.completion_millis = t.timestamp_millis();
                    record.actual_cpu_millis = record.completion_millis - record.start_millis;
                    record.turnaround_millis = record.completion_millis - record.arrival_millis;
                    true
                }
                None => false,
            }
        };
        if recorded {
            self.total_completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn get(&self, name: &str) -> Option<JobMetrics> {
        self.lock_records().get(name).cloned()
    }

    /// Average turnaround over completed jobs, in milliseconds. 0 when none.
    pub fn avg_turnaround_millis(&self) -> f64 {
        self.avg_over_completed(|m| m.turnaround_millis)
    }

    /// Average waiting time over completed jobs, in milliseconds. 0 when none.
    pub fn avg_waiting_millis(&self) -> f64 {
        self.avg_over_completed(|m| m.wait_millis)
    }

    /// Average actual CPU time over completed jobs, in milliseconds. 0 when none.
    pub fn avg_cpu_millis(&self) -> f64 {
        self.avg_over_completed(|m| m.actual_cpu_millis)
    }

    fn avg_over_completed<F>(&self, field: F) -> f64
    where
        F: Fn(&JobMetrics) -> i64,
    {
        let records = self.lock_records();
        let completed: Vec<i64> = records
            .values()
            .filter(|m| m.is_completed())
            .map(field)
            .collect();
        if completed.is_empty() {
            return 0.0;
        }
        completed.iter().sum::<i64>() as f64 / completed.len() as f64
    }

    /// Completed jobs per elapsed second since the last reset.
    pub fn throughput(&self) -> f64 {
        let elapsed_millis =
            Utc::now().timestamp_millis() - self.last_reset_millis.load(Ordering::SeqCst);
        if elapsed_millis <= 0 {
            return 0.0;
        }
        self.total_completed.load(Ordering::SeqCst) as f64 / (elapsed_millis as f64 / 1000.0)
    }

    pub fn total_completed(&self) -> u64 {
        self.total_completed.load(Ordering::SeqCst)
    }

    pub fn total_submitted(&self) -> u64 {
        self.total_submitted.load(Ordering::SeqCst)
    }

    pub fn uptime_millis(&self) -> i64 {
        Utc::now().timestamp_millis() - self.system_start.timestamp_millis()
    }

    /// Clear the per-job records and counters. The system start time is
    /// preserved; the reset time (throughput baseline) moves to now.
    pub fn reset(&self) {
        self.lock_records().clear();
        self.total_completed.store(0, Ordering::SeqCst);
        self.total_submitted.store(0, Ordering::SeqCst);
        self.last_reset_millis
            .store(Utc::now().timestamp_millis(), Ordering::SeqCst);
    }

    /// Copy of the per-job record map, for save/restore in tests.
    pub fn snapshot_map(&self) -> HashMap<String, JobMetrics> {
        self.lock_records().clone()
    }

    /// Merge records into the map, overwriting entries with the same name.
    pub fn merge_map(&self, records: HashMap<String, JobMetrics>) {
        self.lock_records().extend(records);
    }
}

/// Observer adapter feeding state transitions into a `MetricsRecorder`:
/// entering `Running` stamps the start, entering `Completed` stamps the
/// completion.
pub struct MetricsObserver {
    recorder: Arc<MetricsRecorder>,
}

impl MetricsObserver {
    pub fn new(recorder: Arc<MetricsRecorder>) -> Self {
        Self { recorder }
    }
}

impl JobStateObserver for MetricsObserver {
    fn on_job_state_changed(&self, event: &JobStateEvent) -> Result<(), ObserverError> {
        match event.new_status {
            JobStatus::Running => self.recorder.on_start(event.job.name(), Utc::now()),
            JobStatus::Completed => self.recorder.on_completion(event.job.name(), Utc::now()),
            _ => {}
        }
        Ok(())
    }
}
