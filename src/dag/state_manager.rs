// src/dag/state_manager.rs

//! Per-run state management for jobs in the scheduler.

use tracing::{debug, warn};

use crate::dag::job_info::{JobInfo, RunState, ScheduledJob};
use crate::types::JobId;

/// Manages per-run state transitions for jobs.
pub struct StateManager<'a> {
    jobs: &'a mut [JobInfo],
}

impl<'a> StateManager<'a> {
    pub fn new(jobs: &'a mut [JobInfo]) -> Self {
        Self { jobs }
    }

    /// Include `root` and all of its descendants in this run as `Pending`.
    pub fn mark_subtree_pending(&mut self, root: JobId) {
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let Some(info) = self.jobs.get_mut(id) else {
                warn!(job_id = id, "job in child range not present in job list");
                continue;
            };

            if info.run_state.is_none() {
                info.run_state = Some(RunState::Pending);
                debug!(job = %info.name, "marked Pending for this run");
            }
            stack.extend(info.children.clone());
        }
    }

    /// Mark every participating descendant of a failed job as `Blocked`.
    ///
    /// Returns the newly blocked jobs, excluding the failed job itself.
    pub fn mark_descendants_blocked(&mut self, failed_job: JobId) -> Vec<JobId> {
        let mut stack: Vec<JobId> = self
            .jobs
            .get(failed_job)
            .map(|info| info.children.clone().collect())
            .unwrap_or_default();

        let mut newly_blocked = Vec::new();

        while let Some(id) = stack.pop() {
            let Some(info) = self.jobs.get_mut(id) else {
                continue;
            };
            match info.run_state {
                Some(RunState::Pending) | Some(RunState::Ready) => {
                    info.run_state = Some(RunState::Blocked);
                    debug!(job = %info.name, "blocked by upstream failure");
                    newly_blocked.push(id);
                    stack.extend(info.children.clone());
                }
                Some(RunState::Running)
                | Some(RunState::Done)
                | Some(RunState::Failed)
                | Some(RunState::Blocked)
                | None => {
                    // A child cannot be running before its parent is done.
                }
            }
        }

        newly_blocked.sort_unstable();
        newly_blocked
    }

    /// Move the `Pending` children of a finished job to `Ready`.
    pub fn collect_new_ready_jobs(&mut self, parent: JobId) -> Vec<JobId> {
        let children = match self.jobs.get(parent) {
            Some(info) if info.run_state == Some(RunState::Done) => info.children.clone(),
            _ => return Vec::new(),
        };

        let mut ready = Vec::new();
        for id in children {
            if let Some(info) = self.jobs.get_mut(id) {
                if info.run_state == Some(RunState::Pending) {
                    info.run_state = Some(RunState::Ready);
                    debug!(job = %info.name, "parent done; marking Ready");
                    ready.push(id);
                }
            }
        }
        ready
    }

    /// Mark a `Ready` job as `Running` and describe it for the backend.
    pub fn mark_running(&mut self, job_id: JobId) -> Option<ScheduledJob> {
        let info = self.jobs.get_mut(job_id)?;
        if info.run_state != Some(RunState::Ready) {
            warn!(
                job = %info.name,
                state = ?info.run_state,
                "refusing to dispatch a job that is not Ready"
            );
            return None;
        }
        info.run_state = Some(RunState::Running);
        debug!(job = %info.name, "marking Running");

        let jobs: &[JobInfo] = &*self.jobs;
        Some(ScheduledJob::from_job_info(&jobs[job_id], jobs))
    }

    /// Check whether no participating job can still make progress.
    pub fn all_jobs_terminal(&self) -> bool {
        ReadOnlyStateManager::new(&*self.jobs).all_jobs_terminal()
    }
}

/// A read-only view over the job list.
pub struct ReadOnlyStateManager<'a> {
    jobs: &'a [JobInfo],
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(jobs: &'a [JobInfo]) -> Self {
        Self { jobs }
    }

    /// A job may run once its parent is `Done`. The start job of a run has no
    /// participating parent and is always satisfied.
    pub fn parent_satisfied(&self, info: &JobInfo) -> bool {
        match info.parent.and_then(|p| self.jobs.get(p)) {
            Some(parent) => match parent.run_state {
                Some(RunState::Done) => true,
                None => true,
                Some(_) => false,
            },
            None => true,
        }
    }

    pub fn all_jobs_terminal(&self) -> bool {
        !self.jobs.iter().any(|info| {
            matches!(
                info.run_state,
                Some(RunState::Pending) | Some(RunState::Ready) | Some(RunState::Running)
            )
        })
    }

    pub fn in_state(&self, state: RunState) -> Vec<JobId> {
        self.jobs
            .iter()
            .filter(|info| info.run_state == Some(state))
            .map(|info| info.job_id)
            .collect()
    }
}
