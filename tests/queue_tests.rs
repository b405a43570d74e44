
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use csubatch::core::{Job, JobQueue, JobStatus};
use csubatch::error::CsubatchError;
use csubatch::events::LogLevel;
use csubatch::queue_manager::{QueueManager, SOURCE_SCHEDULER_SORT};
use csubatch::state::JobStateManager;

use test_harness::RecordingSink;

fn manager() -> (Arc<QueueManager>, Arc<RecordingSink>) {
    let sink = RecordingSink::new();
    let state_manager = Arc::new(JobStateManager::new(sink.clone()));
    let queue_manager = Arc::new(QueueManager::new(
        state_manager,
        sink.clone(),
        Duration::from_millis(10),
    ));
    (queue_manager, sink)
}

#[test]
fn test_job_creation() {
    let job = Job::new("j1", 5, 2);
    assert_eq!(job.name(), "j1");
    assert_eq!(job.cpu_time(), 5);
    assert_eq!(job.priority(), 2);
    assert_eq!(job.status(), JobStatus::Waiting);
}

#[test]
fn test_queue_push_poll_peek() {
    let mut queue = JobQueue::new();
    assert!(queue.is_empty());
    assert!(queue.poll_head().is_none());

    assert!(queue.push_back(Job::new("a", 1, 0)));
    assert!(queue.push_back(Job::new("b", 2, 0)));
    assert_eq!(queue.len(), 2);

    assert_eq!(queue.peek_head().map(|j| j.name().to_string()), Some("a".to_string()));
    assert_eq!(queue.poll_head().map(|j| j.name().to_string()), Some("a".to_string()));
    assert_eq!(queue.poll_head().map(|j| j.name().to_string()), Some("b".to_string()));
    assert!(queue.is_empty());
}

#[test]
fn test_queue_rejects_duplicate_names() {
    let mut queue = JobQueue::new();
    assert!(queue.push_back(Job::new("a", 1, 0)));
    assert!(!queue.push_back(Job::new("a", 2, 1)));
    assert_eq!(queue.len(), 1);

    // A name held by the running slot is also a duplicate.
    queue.set_running(Job::new("r", 1, 0));
    assert!(!queue.push_back(Job::new("r", 1, 0)));
    queue.clear_running();
    assert!(queue.push_back(Job::new("r", 1, 0)));
}

#[test]
fn test_queue_replace_all_preserves_order() {
    let mut queue = JobQueue::new();
    queue.push_back(Job::new("a", 1, 0));
    queue.push_back(Job::new("b", 2, 0));

    let mut jobs = queue.snapshot();
    jobs.reverse();
    queue.replace_all(jobs);

    let names: Vec<_> = queue.iter().map(|j| j.name().to_string()).collect();
    assert_eq!(names, vec!["b", "a"]);
}

#[test]
fn test_queue_remove_by_name() {
    let mut queue = JobQueue::new();
    queue.push_back(Job::new("a", 1, 0));
    queue.push_back(Job::new("b", 2, 0));

    let removed = queue.remove_by_name("a");
    assert_eq!(removed.map(|j| j.name().to_string()), Some("a".to_string()));
    assert!(queue.remove_by_name("a").is_none());
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn test_add_sets_needs_sort_except_for_scheduler() {
    let (qm, _sink) = manager();
    assert!(!qm.needs_sort());

    qm.add(Job::new("a", 1, 0), "Submitter").await.unwrap();
    assert!(qm.needs_sort());

    qm.set_needs_sort(false);
    qm.add(Job::new("b", 1, 0), SOURCE_SCHEDULER_SORT)
        .await
        .unwrap();
    assert!(!qm.needs_sort());
}

#[tokio::test]
async fn test_add_duplicate_is_rejected() {
    let (qm, sink) = manager();
    qm.add(Job::new("a", 1, 0), "Submitter").await.unwrap();

    let result = qm.add(Job::new("a", 2, 1), "Submitter").await;
    assert!(matches!(result, Err(CsubatchError::InvalidJob(_))));
    assert_eq!(qm.len().await, 1);
    assert!(sink.count_at(LogLevel::Warn) > 0);
}

#[tokio::test]
async fn test_add_refuses_terminal_job() {
    let (qm, _sink) = manager();
    let sink = RecordingSink::new();
    let state_manager = Arc::new(JobStateManager::new(sink));

    // Drive a job to a terminal state through legal transitions.
    let job = Job::new("done", 1, 0);
    state_manager
        .update_status(&job, JobStatus::Selected, "test", "")
        .unwrap();
    state_manager
        .update_status(&job, JobStatus::Running, "test", "")
        .unwrap();
    state_manager
        .update_status(&job, JobStatus::Completed, "test", "")
        .unwrap();

    let result = qm.add(job, "Submitter").await;
    assert!(matches!(result, Err(CsubatchError::InvalidTransition { .. })));
    assert!(qm.is_empty().await);
}

#[tokio::test]
async fn test_remove_by_name_cancels_job() {
    let (qm, _sink) = manager();
    let job = Job::new("a", 1, 0);
    qm.add(job.clone(), "Submitter").await.unwrap();

    assert!(qm.remove_by_name("a", "Submitter").await);
    assert_eq!(job.status(), JobStatus::Canceled);
    assert!(qm.is_empty().await);

    assert!(!qm.remove_by_name("a", "Submitter").await);
    assert!(!qm.remove_by_name("missing", "Submitter").await);
}

#[tokio::test]
async fn test_get_by_name_and_min_lookups() {
    let (qm, _sink) = manager();
    qm.add(Job::new("slow", 9, 1), "Submitter").await.unwrap();
    qm.add(Job::new("fast", 2, 7), "Submitter").await.unwrap();
    qm.add(Job::new("mid", 5, 3), "Submitter").await.unwrap();

    assert_eq!(
        qm.get_by_name("mid").await.map(|j| j.cpu_time()),
        Some(5)
    );
    assert!(qm.get_by_name("missing").await.is_none());

    assert_eq!(
        qm.get_shortest().await.map(|j| j.name().to_string()),
        Some("fast".to_string())
    );
    assert_eq!(
        qm.get_highest_priority().await.map(|j| j.name().to_string()),
        Some("slow".to_string())
    );
}

#[tokio::test]
async fn test_clear_empties_pending() {
    let (qm, _sink) = manager();
    qm.add(Job::new("a", 1, 0), "Submitter").await.unwrap();
    qm.add(Job::new("b", 1, 0), "Submitter").await.unwrap();

    qm.set_needs_sort(false);
    qm.clear("Submitter").await;
    assert!(qm.is_empty().await);
    assert!(qm.needs_sort());
}

#[tokio::test]
async fn test_retrieve_returns_head_in_order() {
    let (qm, _sink) = manager();
    qm.add(Job::new("a", 1, 0), "Submitter").await.unwrap();
    qm.add(Job::new("b", 1, 0), "Submitter").await.unwrap();

    let cancel = CancellationToken::new();
    let first = qm.retrieve(&cancel).await.unwrap();
    let second = qm.retrieve(&cancel).await.unwrap();
    assert_eq!(first.name(), "a");
    assert_eq!(second.name(), "b");
}

#[tokio::test]
async fn test_retrieve_blocks_until_job_arrives() {
    let (qm, _sink) = manager();
    let cancel = CancellationToken::new();

    let waiter = {
        let qm = qm.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { qm.retrieve(&cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!waiter.is_finished());

    qm.add(Job::new("late", 1, 0), "Submitter").await.unwrap();
    let job = waiter.await.unwrap().unwrap();
    assert_eq!(job.name(), "late");
}

#[tokio::test]
async fn test_retrieve_observes_cancellation() {
    let (qm, _sink) = manager();
    let cancel = CancellationToken::new();

    let waiter = {
        let qm = qm.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { qm.retrieve(&cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let result = waiter.await.unwrap();
    assert!(matches!(result, Err(CsubatchError::Cancelled)));
}

#[tokio::test]
async fn test_unique_residence_in_quiescent_queue() {
    let (qm, _sink) = manager();
    for name in ["a", "b", "c"] {
        qm.add(Job::new(name, 1, 0), "Submitter").await.unwrap();
    }

    let cancel = CancellationToken::new();
    let popped = qm.retrieve(&cancel).await.unwrap();
    qm.set_running(popped.clone()).await;

    // Popped job lives in the running slot only; the rest pend exactly once.
    let pending = qm.snapshot("test").await;
    let mut names: Vec<_> = pending.iter().map(|j| j.name().to_string()).collect();
    if let Some(running) = qm.running().await {
        names.push(running.name().to_string());
    }
    let mut deduped = names.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(names.len(), deduped.len());
    assert_eq!(names.len(), 3);
}
