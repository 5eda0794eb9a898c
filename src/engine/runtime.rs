// src/engine/runtime.rs

use std::fmt;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::dag::ScheduledJob;
use crate::errors::Result;
use crate::exec::JobBackend;

use super::core::CoreRuntime;
use super::report::CascadeReport;
use super::{CoreCommand, RuntimeEvent};

/// Drives the job scheduler in response to `RuntimeEvent`s, and delegates
/// actual job execution to a `JobBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: reading events from
/// channels and dispatching jobs to the backend.
pub struct Runtime<B: JobBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    backend: B,
}

impl<B: JobBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<B: JobBackend> Runtime<B> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, backend: B) -> Self {
        Self {
            core,
            event_rx,
            backend,
        }
    }

    /// Main event loop.
    ///
    /// - Starts the run and dispatches the first jobs.
    /// - Consumes `RuntimeEvent`s from `event_rx` and feeds them into the core.
    /// - Executes commands returned by the core until no job is pending or
    ///   running.
    pub async fn run(mut self) -> Result<CascadeReport> {
        info!(
            start_job_id = self.core.options().start_job_id,
            worker_limit = self.core.options().worker_limit,
            skip_start_job = self.core.options().skip_start_job,
            "cascade runtime started"
        );

        let mut step = self.core.start()?;

        loop {
            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                break;
            }

            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    return Err(anyhow!(
                        "job event channel closed while jobs {:?} were still running",
                        self.core.running_jobs()
                    )
                    .into());
                }
            };

            debug!(?event, "runtime received event");
            step = self.core.step(event);
        }

        let report = self.core.report();
        info!(
            completed = report.completed.len(),
            failed = report.failures.len(),
            blocked = report.blocked.len(),
            "cascade runtime finished"
        );
        Ok(report)
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchJobs(jobs) => {
                self.dispatch(jobs).await?;
            }
            CoreCommand::RequestExit => {
                debug!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    async fn dispatch(&mut self, jobs: Vec<ScheduledJob>) -> Result<()> {
        if jobs.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
        debug!(?names, "dispatching ready jobs");

        self.backend.dispatch_jobs(jobs).await?;
        Ok(())
    }
}
