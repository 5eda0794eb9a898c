// src/lib.rs

pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod hierarchy;
pub mod jobs;
pub mod logging;
pub mod resume;
pub mod summary;
pub mod types;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::loader::load_and_validate;
use crate::dag::Scheduler;
use crate::engine::{CascadeReport, CoreRuntime, RunOptions, Runtime, RuntimeEvent};
use crate::errors::{CascadeError, Result};
use crate::exec::{JobBackend, JobResources, RealJobBackend};
use crate::hierarchy::CascadeSetup;
use crate::jobs::JobPlan;

pub use crate::resume::{continue_cascade, ResumePoint};

/// Execute the subtree of `options.start_job_id` with the production job
/// backend.
pub async fn run(plan: &JobPlan, options: RunOptions, resources: JobResources) -> Result<CascadeReport> {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let backend = RealJobBackend::new(resources, rt_tx);
    run_with_backend(plan, options, backend, rt_rx).await
}

/// Execute a plan with any [`JobBackend`]. The backend must report every
/// dispatched job on the sender paired with `event_rx`.
pub async fn run_with_backend<B: JobBackend>(
    plan: &JobPlan,
    options: RunOptions,
    backend: B,
    event_rx: mpsc::Receiver<RuntimeEvent>,
) -> Result<CascadeReport> {
    if options.worker_limit == 0 {
        return Err(CascadeError::config("worker_limit must be at least 1"));
    }
    if options.start_job_id >= plan.len() {
        return Err(CascadeError::config(format!(
            "start job {} is outside the job table of {} jobs",
            options.start_job_id,
            plan.len()
        )));
    }

    // The pure core is the single source of truth for run semantics.
    let core = CoreRuntime::new(Scheduler::from_plan(plan), options);
    Runtime::new(core, event_rx, backend).run().await
}

/// Build the full job plan and run the whole cascade from the root fit. The
/// root job's working database must already exist.
pub async fn run_cascade(setup: &CascadeSetup, resources: JobResources) -> Result<CascadeReport> {
    let plan = JobPlan::for_cascade(setup)?;
    info!(
        jobs = plan.len(),
        max_workers = setup.max_workers,
        result_dir = %setup.result_dir.display(),
        "starting cascade"
    );
    run(&plan, RunOptions::with_workers(setup.max_workers), resources).await
}

/// Load and validate a configuration file into a [`CascadeSetup`].
///
/// A relative `result_dir` is taken relative to the directory holding the
/// configuration file.
pub fn setup_from_config_path(config_path: &Path) -> Result<CascadeSetup> {
    let mut cfg = load_and_validate(config_path)?;
    if cfg.cascade.result_dir.is_relative() {
        cfg.cascade.result_dir = config_root_dir(config_path).join(&cfg.cascade.result_dir);
    }
    CascadeSetup::from_config(&cfg)
}

/// High-level entry point: configuration file in, report out, using the
/// configured engine program and copy derivation.
pub async fn run_from_config(config_path: &Path) -> Result<CascadeReport> {
    let setup = setup_from_config_path(config_path)?;
    let resources = JobResources::from_setup(&setup);
    run_cascade(&setup, resources).await
}

/// Figure out the directory a configuration file lives in.
///
/// A bare filename like "Cascade.toml" (parent = "") maps to ".".
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Dry-run listing of a plan: one line per job with its child range and
/// working database.
pub fn describe_plan(plan: &JobPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "cascade plan ({} jobs):", plan.len());
    for job in plan.table().iter() {
        let _ = write!(out, "  [{}] {}", job.job_id, job.job_name);
        if !job.is_leaf() {
            let _ = write!(out, " -> {}..{}", job.start_child_job_id, job.end_child_job_id);
        }
        if let Some(db) = plan.database(job.job_id) {
            let _ = write!(out, "  {}", db.display());
        }
        out.push('\n');
    }
    debug!(jobs = plan.len(), "described plan (no execution)");
    out
}
