// src/exec/backend.rs

//! Pluggable job backend abstraction.
//!
//! The runtime talks to a `JobBackend` instead of spawning work itself.
//! This makes it easy to swap in a fake backend in tests.
//!
//! - `RealJobBackend` is the production implementation. It spawns one Tokio
//!   task per dispatched job that runs [`job_runner::run_job`].
//! - Tests can provide their own `JobBackend` that, for example, records
//!   which jobs were dispatched and directly emits `JobCompleted` events.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::dag::ScheduledJob;
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::exec::derive::{CopyDeriver, DatabaseDeriver};
use crate::exec::engine::{CommandFitEngine, FitEngine};
use crate::exec::job_runner;
use crate::exec::shared::SharedState;
use crate::hierarchy::CascadeSetup;
use crate::types::EngineStep;

/// Trait abstracting how scheduled jobs are executed.
pub trait JobBackend: Send {
    /// Dispatch the given jobs for execution.
    ///
    /// Every dispatched job must eventually produce exactly one
    /// `RuntimeEvent::JobCompleted`.
    fn dispatch_jobs(
        &mut self,
        jobs: Vec<ScheduledJob>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Collaborators and shared state every job needs.
#[derive(Clone)]
pub struct JobResources {
    pub engine: Arc<dyn FitEngine>,
    pub deriver: Arc<dyn DatabaseDeriver>,
    pub shared: SharedState,
    pub steps: Vec<EngineStep>,
}

impl fmt::Debug for JobResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobResources")
            .field("shared", &self.shared)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl JobResources {
    pub fn new(
        engine: Arc<dyn FitEngine>,
        deriver: Arc<dyn DatabaseDeriver>,
        shared: SharedState,
        steps: Vec<EngineStep>,
    ) -> Self {
        Self {
            engine,
            deriver,
            shared,
            steps,
        }
    }

    /// Production collaborators: the configured engine program, copy
    /// derivation and the log in the result directory.
    pub fn from_setup(setup: &CascadeSetup) -> Self {
        Self::new(
            Arc::new(CommandFitEngine::new(setup.engine_program.clone())),
            Arc::new(CopyDeriver),
            SharedState::for_result_dir(&setup.result_dir),
            setup.engine_steps.clone(),
        )
    }
}

/// Real job backend used in production.
pub struct RealJobBackend {
    resources: Arc<JobResources>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl RealJobBackend {
    pub fn new(resources: JobResources, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            resources: Arc::new(resources),
            runtime_tx,
        }
    }
}

impl JobBackend for RealJobBackend {
    fn dispatch_jobs(
        &mut self,
        jobs: Vec<ScheduledJob>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for job in jobs {
                debug!(job = %job.name, job_id = job.job_id, "spawning job");
                tokio::spawn(job_runner::run_job(
                    job,
                    Arc::clone(&self.resources),
                    self.runtime_tx.clone(),
                ));
            }
            Ok(())
        })
    }
}
