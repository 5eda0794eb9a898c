// src/resume.rs

//! Continue an interrupted cascade from a job whose fit already completed.
//!
//! The job table is rebuilt rooted at the resume point with the same goal
//! set, split set and overall-root path layout, so every job keeps the
//! directory it had in the full cascade. The children of the resume point
//! are re-derived from its database before the run starts.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::dag::job_info::{JobInfo, ScheduledJob};
use crate::engine::{CascadeReport, RunOptions};
use crate::errors::{CascadeError, Result};
use crate::exec::job_runner::derive_children;
use crate::exec::{JobResources, MessageType};
use crate::hierarchy::CascadeSetup;
use crate::jobs::{JobPlan, JobTableBuilder, PathResolver};
use crate::types::{NodeId, SplitReferenceId};

/// Where to continue a cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumePoint {
    /// A region, optionally with the split reference of the job to resume.
    /// Without one, the root split reference is assumed.
    Job {
        region: String,
        split_reference: Option<String>,
    },
    /// A completed working database (or its directory) inside the result
    /// directory.
    Database(PathBuf),
}

impl ResumePoint {
    pub fn region(region: impl Into<String>) -> Self {
        ResumePoint::Job {
            region: region.into(),
            split_reference: None,
        }
    }

    pub fn split(region: impl Into<String>, split_reference: impl Into<String>) -> Self {
        ResumePoint::Job {
            region: region.into(),
            split_reference: Some(split_reference.into()),
        }
    }

    pub fn database(path: impl AsRef<Path>) -> Self {
        ResumePoint::Database(path.as_ref().to_path_buf())
    }

    /// Structural identity of the job to resume from.
    pub fn resolve(&self, setup: &CascadeSetup) -> Result<(NodeId, Option<SplitReferenceId>)> {
        match self {
            ResumePoint::Job {
                region,
                split_reference,
            } => {
                let node = setup.regions.id_of(region)?;
                let split = match split_reference {
                    Some(name) => Some(setup.split_references.id_of(name)?),
                    None => setup.root_split_reference_id,
                };
                Ok((node, split))
            }
            ResumePoint::Database(path) => PathResolver::new(setup).locate(path),
        }
    }
}

/// Job plan rooted at the resume point.
///
/// The resume point must be a job of the full cascade. Below a split region
/// a region alone names no job; its split reference is required.
pub fn resume_plan(setup: &CascadeSetup, resume_at: &ResumePoint) -> Result<JobPlan> {
    let (node, split) = resume_at.resolve(setup)?;

    let full = JobTableBuilder::from_setup(setup)?.build_full()?;
    if full.find(node, split).is_none() {
        return Err(CascadeError::config(format!(
            "resume point {resume_at:?} (region '{}', split reference {}) is not a job of this cascade",
            setup.regions.name(node),
            setup.split_references.name_of(split).unwrap_or("none")
        )));
    }

    let plan = JobPlan::for_resume(setup, node, split)?;

    match plan.job(0) {
        Some(job) if job.fit_node_id == node && job.split_reference_id == split => Ok(plan),
        _ => Err(CascadeError::config(format!(
            "job table for resume point {resume_at:?} does not start at that job"
        ))),
    }
}

/// Re-derive the children of the resume point and run the rest of the
/// cascade below it.
pub async fn continue_cascade(
    setup: &CascadeSetup,
    resume_at: &ResumePoint,
    resources: JobResources,
) -> Result<CascadeReport> {
    let plan = resume_plan(setup, resume_at)?;

    let jobs = JobInfo::from_plan(&plan);
    let start = ScheduledJob::from_job_info(&jobs[0], &jobs);

    if !tokio::fs::try_exists(&start.database).await? {
        return Err(CascadeError::config(format!(
            "cannot resume from '{}': {} does not exist",
            start.name,
            start.database.display()
        )));
    }

    info!(
        job = %start.name,
        database = %start.database.display(),
        jobs = plan.len(),
        "continuing cascade"
    );

    derive_children(&start.database, &start.children, &resources).await?;
    resources
        .shared
        .append(
            &start.name,
            MessageType::Resume,
            format!("continue cascade from {}", start.database.display()),
        )
        .await?;

    let options = RunOptions {
        start_job_id: 0,
        worker_limit: setup.max_workers,
        skip_start_job: true,
    };
    crate::run(&plan, options, resources).await
}
