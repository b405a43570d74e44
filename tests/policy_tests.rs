
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use csubatch::core::{Job, JobRef};
use csubatch::policy::{sort_jobs, Policy};
use csubatch::queue_manager::QueueManager;
use csubatch::state::JobStateManager;

use test_harness::RecordingSink;

fn job_at(name: &str, cpu_time: u64, priority: u32, arrival_millis: i64) -> JobRef {
    let arrival = Utc.timestamp_millis_opt(arrival_millis).unwrap();
    Job::with_arrival(name, cpu_time, priority, arrival)
}

fn names(jobs: &[JobRef]) -> Vec<String> {
    jobs.iter().map(|j| j.name().to_string()).collect()
}

#[test]
fn test_fcfs_orders_by_arrival() {
    let mut jobs = vec![
        job_at("late", 1, 0, 3000),
        job_at("early", 1, 0, 1000),
        job_at("mid", 1, 0, 2000),
    ];
    sort_jobs(&mut jobs, Policy::Fcfs);
    assert_eq!(names(&jobs), vec!["early", "mid", "late"]);
}

#[test]
fn test_sjf_orders_by_cpu_time() {
    let mut jobs = vec![
        job_at("j1", 5, 1, 1000),
        job_at("j2", 3, 2, 2000),
        job_at("j3", 7, 3, 3000),
    ];
    sort_jobs(&mut jobs, Policy::Sjf);
    assert_eq!(names(&jobs), vec!["j2", "j1", "j3"]);
}

#[test]
fn test_priority_smaller_value_runs_earlier() {
    let mut jobs = vec![
        job_at("low", 1, 9, 1000),
        job_at("high", 1, 0, 2000),
        job_at("mid", 1, 4, 3000),
    ];
    sort_jobs(&mut jobs, Policy::Priority);
    assert_eq!(names(&jobs), vec!["high", "mid", "low"]);
}

#[test]
fn test_equal_keys_break_ties_by_arrival() {
    let mut jobs = vec![
        job_at("second", 5, 1, 2000),
        job_at("first", 5, 1, 1000),
    ];
    sort_jobs(&mut jobs, Policy::Sjf);
    assert_eq!(names(&jobs), vec!["first", "second"]);

    let mut jobs = vec![
        job_at("second", 1, 3, 2000),
        job_at("first", 2, 3, 1000),
    ];
    sort_jobs(&mut jobs, Policy::Priority);
    assert_eq!(names(&jobs), vec!["first", "second"]);
}

#[test]
fn test_sort_is_stable_for_identical_keys() {
    // Same cpu time, priority and arrival: submission order must survive.
    let jobs: Vec<JobRef> = (0..8)
        .map(|i| job_at(&format!("j{i}"), 4, 2, 1000))
        .collect();
    for policy in [Policy::Fcfs, Policy::Sjf, Policy::Priority] {
        let mut sorted = jobs.clone();
        sort_jobs(&mut sorted, policy);
        assert_eq!(names(&sorted), names(&jobs), "policy {policy} not stable");
    }
}

#[test]
fn test_policy_parse_and_display() {
    assert_eq!("fcfs".parse::<Policy>().unwrap(), Policy::Fcfs);
    assert_eq!("SJF".parse::<Policy>().unwrap(), Policy::Sjf);
    assert_eq!(" Priority ".parse::<Policy>().unwrap(), Policy::Priority);
    assert!("round-robin".parse::<Policy>().is_err());

    assert_eq!(Policy::Fcfs.to_string(), "FCFS");
    assert_eq!(Policy::Sjf.to_string(), "SJF");
    assert_eq!(Policy::Priority.to_string(), "PRIORITY");
    assert_eq!(Policy::default(), Policy::Fcfs);
}

#[tokio::test]
async fn test_sort_pending_applies_policy_and_clears_flag() {
    let sink = RecordingSink::new();
    let state_manager = Arc::new(JobStateManager::new(sink.clone()));
    let qm = Arc::new(QueueManager::new(
        state_manager,
        sink,
        Duration::from_millis(10),
    ));

    qm.add(job_at("j1", 5, 1, 1000), "Submitter").await.unwrap();
    qm.add(job_at("j2", 3, 2, 2000), "Submitter").await.unwrap();
    qm.add(job_at("j3", 7, 3, 3000), "Submitter").await.unwrap();
    assert!(qm.needs_sort());

    qm.sort_pending(Policy::Sjf).await;
    assert!(!qm.needs_sort());

    let pending = qm.snapshot("test").await;
    assert_eq!(names(&pending), vec!["j2", "j1", "j3"]);
    for window in pending.windows(2) {
        assert!(Policy::Sjf.compare(&window[0], &window[1]) != std::cmp::Ordering::Greater);
    }
}
