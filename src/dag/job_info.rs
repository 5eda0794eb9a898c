// src/dag/job_info.rs

//! Per-job metadata and per-run state.

use std::ops::Range;
use std::path::PathBuf;

use crate::hierarchy::SplitReference;
use crate::jobs::JobPlan;
use crate::types::JobId;

/// Per-run state of a job (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Part of the run, waiting for its parent to finish.
    Pending,
    /// Parent is done; waiting for a free worker.
    Ready,
    /// Dispatched to the backend.
    Running,
    /// Finished successfully (or skipped as already complete).
    Done,
    /// The job itself failed.
    Failed,
    /// An ancestor failed, so this job will never become eligible.
    Blocked,
}

/// Public, read-only view of a job's per-run state.
///
/// This is exposed for tests and diagnostics without leaking the internal
/// `RunState` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRunState {
    /// The job is outside the subtree of the run's start job.
    NotInRun,
    Pending,
    Ready,
    Running,
    Done,
    Failed,
    Blocked,
}

impl From<Option<RunState>> for JobRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => JobRunState::NotInRun,
            Some(RunState::Pending) => JobRunState::Pending,
            Some(RunState::Ready) => JobRunState::Ready,
            Some(RunState::Running) => JobRunState::Running,
            Some(RunState::Done) => JobRunState::Done,
            Some(RunState::Failed) => JobRunState::Failed,
            Some(RunState::Blocked) => JobRunState::Blocked,
        }
    }
}

/// Static job information derived from the plan, plus per-run state.
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub job_id: JobId,
    pub name: String,
    pub directory: PathBuf,
    pub database: PathBuf,
    pub split_reference: Option<SplitReference>,
    /// The job whose child range contains this one.
    pub parent: Option<JobId>,
    pub children: Range<JobId>,

    /// Per-run state (None if not participating in the run).
    pub run_state: Option<RunState>,

    /// Failure detail reported by the backend.
    pub failure: Option<String>,
}

impl JobInfo {
    pub fn from_plan(plan: &JobPlan) -> Vec<JobInfo> {
        plan.table()
            .iter()
            .map(|job| JobInfo {
                job_id: job.job_id,
                name: job.job_name.clone(),
                directory: plan.directory(job.job_id).map(PathBuf::from).unwrap_or_default(),
                database: plan.database(job.job_id).map(PathBuf::from).unwrap_or_default(),
                split_reference: plan.split_reference(job.job_id).cloned(),
                parent: plan.table().parent_of(job.job_id),
                children: job.child_range(),
                run_state: None,
                failure: None,
            })
            .collect()
    }
}

/// Target of the database derivation step: one child job's initial working
/// database.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildDatabase {
    pub job_id: JobId,
    pub job_name: String,
    pub directory: PathBuf,
    pub database: PathBuf,
    /// Covariate reference assignment for the child's fit.
    pub split_reference: Option<SplitReference>,
}

impl ChildDatabase {
    pub fn from_job_info(info: &JobInfo) -> Self {
        Self {
            job_id: info.job_id,
            job_name: info.name.clone(),
            directory: info.directory.clone(),
            database: info.database.clone(),
            split_reference: info.split_reference.clone(),
        }
    }
}

/// Description of a job that the scheduler wants the backend to run now.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub job_id: JobId,
    pub name: String,
    pub directory: PathBuf,
    pub database: PathBuf,
    pub split_reference: Option<SplitReference>,
    /// Databases to derive once this job's fit is complete.
    pub children: Vec<ChildDatabase>,
}

impl ScheduledJob {
    pub fn from_job_info(info: &JobInfo, jobs: &[JobInfo]) -> Self {
        let children = info
            .children
            .clone()
            .filter_map(|id| jobs.get(id))
            .map(ChildDatabase::from_job_info)
            .collect();
        Self {
            job_id: info.job_id,
            name: info.name.clone(),
            directory: info.directory.clone(),
            database: info.database.clone(),
            split_reference: info.split_reference.clone(),
            children,
        }
    }
}
