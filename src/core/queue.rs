use std::collections::VecDeque;

use crate::core::job::JobRef;

/// The pending job sequence plus an at-most-one running slot.
///
/// Insertion appends to the tail, retrieval removes from the head, and a
/// re-sort replaces the whole sequence at once. The queue carries no locking
/// of its own: the `QueueManager` owns the single mutex that guards it, and
/// every multi-step invariant is enforced there.
#[derive(Debug, Default)]
pub struct JobQueue {
    pending: VecDeque<JobRef>,
    running: Option<JobRef>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job to the tail. Returns false if a job with the same name is
    /// already pending or running; the sequence never holds duplicates.
    pub fn push_back(&mut self, job: JobRef) -> bool {
        if self.contains(job.name()) {
            return false;
        }
        self.pending.push_back(job);
        true
    }

    /// Remove and return the head of the pending sequence.
    pub fn poll_head(&mut self) -> Option<JobRef> {
        self.pending.pop_front()
    }

    pub fn peek_head(&self) -> Option<&JobRef> {
        self.pending.front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pending.iter().any(|j| j.name() == name)
            || self.running.as_ref().is_some_and(|j| j.name() == name)
    }

    /// Copy of the pending sequence in current order.
    pub fn snapshot(&self) -> Vec<JobRef> {
        self.pending.iter().cloned().collect()
    }

    /// Replace the pending contents with `jobs`, preserving their order.
    pub fn replace_all(&mut self, jobs: Vec<JobRef>) {
        self.pending = jobs.into();
    }

    /// Stable in-place sort of the pending sequence.
    pub fn sort_pending_by<F>(&mut self, compare: F)
    where
        F: FnMut(&JobRef, &JobRef) -> std::cmp::Ordering,
    {
        self.pending.make_contiguous().sort_by(compare);
    }

    /// Remove and return the first pending job with the given name.
    pub fn remove_by_name(&mut self, name: &str) -> Option<JobRef> {
        let position = self.pending.iter().position(|j| j.name() == name)?;
        self.pending.remove(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobRef> {
        self.pending.iter()
    }

    pub fn set_running(&mut self, job: JobRef) {
        self.running = Some(job);
    }

    pub fn clear_running(&mut self) {
        self.running = None;
    }

    pub fn running(&self) -> Option<JobRef> {
        self.running.clone()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.running = None;
    }
}
