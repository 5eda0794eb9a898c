// src/engine/report.rs

//! Outcome of a whole run.

use std::path::PathBuf;

use crate::dag::{JobRunState, Scheduler};
use crate::errors::{CascadeError, Result};
use crate::types::JobId;

/// A job that failed during the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub job_id: JobId,
    pub job_name: String,
    pub database: PathBuf,
    pub detail: String,
}

/// What happened to every job of the run.
///
/// Failures are collected rather than raised; use
/// [`CascadeReport::into_result`] to turn the first one into an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub start_job_id: JobId,
    /// Whether the start job was taken as already complete.
    pub skipped_start_job: bool,
    /// Jobs that ran to completion, in ascending id order. A skipped start
    /// job is not listed.
    pub completed: Vec<JobId>,
    pub failures: Vec<JobFailure>,
    /// Jobs that never ran because an ancestor failed.
    pub blocked: Vec<JobId>,
}

impl CascadeReport {
    pub fn from_scheduler(scheduler: &Scheduler, skipped_start_job: bool) -> Self {
        let start_job_id = scheduler.start_job_id().unwrap_or(0);

        let completed = scheduler
            .jobs_in_state(JobRunState::Done)
            .into_iter()
            .filter(|&id| !(skipped_start_job && id == start_job_id))
            .collect();

        let failures = scheduler
            .jobs_in_state(JobRunState::Failed)
            .into_iter()
            .filter_map(|id| scheduler.job(id))
            .map(|info| JobFailure {
                job_id: info.job_id,
                job_name: info.name.clone(),
                database: info.database.clone(),
                detail: info.failure.clone().unwrap_or_default(),
            })
            .collect();

        Self {
            start_job_id,
            skipped_start_job,
            completed,
            failures,
            blocked: scheduler.jobs_in_state(JobRunState::Blocked),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.blocked.is_empty()
    }

    /// `Err(JobFailed)` for the first failed job, else the report itself.
    pub fn into_result(self) -> Result<Self> {
        match self.failures.first() {
            None => Ok(self),
            Some(failure) => Err(CascadeError::JobFailed {
                job: failure.job_name.clone(),
                database: failure.database.clone(),
                detail: failure.detail.clone(),
            }),
        }
    }
}
