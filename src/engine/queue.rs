// src/engine/queue.rs

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::types::JobId;

/// FIFO of eligible jobs waiting for a worker, plus the count of jobs
/// currently holding one.
///
/// Semantics:
/// - `push_ready` appends jobs whose parent is done, in the order the
///   scheduler released them.
/// - `admit` pops from the front while fewer than `worker_limit` jobs are
///   running and counts each popped job as running.
/// - `release` frees the worker of a finished job.
///
/// The running count never exceeds `worker_limit`.
#[derive(Debug)]
pub struct DispatchQueue {
    worker_limit: usize,
    waiting: VecDeque<JobId>,
    running: usize,
}

impl DispatchQueue {
    /// Create a queue for `worker_limit` workers.
    ///
    /// `worker_limit` is clamped to at least 1; configuration validation
    /// rejects 0 before this point.
    pub fn new(worker_limit: usize) -> Self {
        if worker_limit == 0 {
            warn!("worker_limit of 0 requested; using 1");
        }
        Self {
            worker_limit: worker_limit.max(1),
            waiting: VecDeque::new(),
            running: 0,
        }
    }

    pub fn worker_limit(&self) -> usize {
        self.worker_limit
    }

    /// Number of jobs currently holding a worker.
    pub fn running(&self) -> usize {
        self.running
    }

    /// Number of eligible jobs waiting for a worker.
    pub fn waiting(&self) -> usize {
        self.waiting.len()
    }

    /// Returns true if no job is waiting and no worker is busy.
    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty() && self.running == 0
    }

    pub fn push_ready(&mut self, jobs: impl IntoIterator<Item = JobId>) {
        for job_id in jobs {
            debug!(job_id, "queued for dispatch");
            self.waiting.push_back(job_id);
        }
    }

    /// Take as many waiting jobs as there are free workers.
    pub fn admit(&mut self) -> Vec<JobId> {
        let free = self.worker_limit.saturating_sub(self.running);
        let take = free.min(self.waiting.len());
        let admitted: Vec<JobId> = self.waiting.drain(..take).collect();
        self.running += admitted.len();
        if !admitted.is_empty() {
            debug!(
                ?admitted,
                running = self.running,
                waiting = self.waiting.len(),
                "admitted jobs to workers"
            );
        }
        admitted
    }

    /// Free the worker held by a finished job.
    pub fn release(&mut self) {
        if self.running == 0 {
            warn!("release called with no running jobs; ignoring");
            return;
        }
        self.running -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_worker_limit_in_fifo_order() {
        let mut q = DispatchQueue::new(2);
        q.push_ready([4, 1, 7]);
        assert_eq!(q.admit(), vec![4, 1]);
        assert_eq!(q.running(), 2);
        assert!(q.admit().is_empty());

        q.release();
        assert_eq!(q.admit(), vec![7]);
        assert_eq!(q.waiting(), 0);
    }

    #[test]
    fn zero_limit_is_clamped_to_one() {
        let mut q = DispatchQueue::new(0);
        assert_eq!(q.worker_limit(), 1);
        q.push_ready([0, 1]);
        assert_eq!(q.admit(), vec![0]);
    }

    #[test]
    fn release_without_running_is_ignored() {
        let mut q = DispatchQueue::new(1);
        q.release();
        assert_eq!(q.running(), 0);
        assert!(q.is_empty());
    }
}
