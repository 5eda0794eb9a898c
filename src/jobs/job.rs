// src/jobs/job.rs

//! Job records and the flat job table.

use std::ops::Range;

use crate::types::{JobId, NodeId, SplitReferenceId};

/// One (region, split reference) fit and its place in the job table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub job_id: JobId,
    /// Region name, suffixed with `.{reference}` when the job carries a
    /// split reference.
    pub job_name: String,
    pub fit_node_id: NodeId,
    pub split_reference_id: Option<SplitReferenceId>,
    /// Half-open range of this job's direct children in the table.
    pub start_child_job_id: JobId,
    pub end_child_job_id: JobId,
}

impl Job {
    pub fn child_range(&self) -> Range<JobId> {
        self.start_child_job_id..self.end_child_job_id
    }

    pub fn is_leaf(&self) -> bool {
        self.start_child_job_id >= self.end_child_job_id
    }
}

/// Jobs in dispatch order; job 0 is where the run starts.
///
/// Read-only once built. Every job except job 0 lies in exactly one parent's
/// child range, and a parent always precedes its children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobTable {
    jobs: Vec<Job>,
    parents: Vec<Option<JobId>>,
}

impl JobTable {
    pub(crate) fn from_jobs(jobs: Vec<Job>) -> Self {
        let mut parents = vec![None; jobs.len()];
        for job in &jobs {
            for child in job.child_range() {
                if let Some(slot) = parents.get_mut(child) {
                    *slot = Some(job.job_id);
                }
            }
        }
        Self { jobs, parents }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, job_id: JobId) -> Option<&Job> {
        self.jobs.get(job_id)
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// The job whose child range contains `job_id` (`None` for job 0).
    pub fn parent_of(&self, job_id: JobId) -> Option<JobId> {
        self.parents.get(job_id).copied().flatten()
    }

    pub fn children_of(&self, job_id: JobId) -> Range<JobId> {
        self.get(job_id).map(|j| j.child_range()).unwrap_or(0..0)
    }

    /// `job_id` followed by all of its descendants, parents before children.
    pub fn subtree(&self, job_id: JobId) -> Vec<JobId> {
        let mut out = Vec::new();
        if job_id >= self.len() {
            return out;
        }
        let mut stack = vec![job_id];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children_of(id).rev());
        }
        out
    }

    pub fn find(&self, fit_node_id: NodeId, split_reference_id: Option<SplitReferenceId>) -> Option<JobId> {
        self.jobs
            .iter()
            .position(|j| j.fit_node_id == fit_node_id && j.split_reference_id == split_reference_id)
    }
}
