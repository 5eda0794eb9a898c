// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for
//! reading events from channels and sending `ScheduledJob`s to the backend.
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, filesystem, or processes.

use crate::dag::{JobRunState, Scheduler};
use crate::engine::event_handlers::{self, CoreStep};
use crate::engine::queue::DispatchQueue;
use crate::engine::report::CascadeReport;
use crate::engine::{RunOptions, RuntimeEvent};
use crate::errors::Result;
use crate::types::JobId;

/// Pure core runtime state.
///
/// This owns the job scheduler, the dispatch queue and the run options.
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    queue: DispatchQueue,
    options: RunOptions,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, options: RunOptions) -> Self {
        Self {
            scheduler,
            queue: DispatchQueue::new(options.worker_limit),
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Expose whether the scheduler is idle (for tests).
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// Jobs currently holding a worker.
    pub fn running_jobs(&self) -> Vec<JobId> {
        self.scheduler.jobs_in_state(JobRunState::Running)
    }

    pub fn run_state_of(&self, job_id: JobId) -> Option<JobRunState> {
        self.scheduler.run_state_of(job_id)
    }

    /// Begin the run and return the first dispatch.
    pub fn start(&mut self) -> Result<CoreStep> {
        event_handlers::start_run(&mut self.scheduler, &mut self.queue, &self.options)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::JobCompleted { job_id, outcome } => {
                event_handlers::handle_job_completion(
                    &mut self.scheduler,
                    &mut self.queue,
                    job_id,
                    outcome,
                )
            }
        }
    }

    pub fn report(&self) -> CascadeReport {
        CascadeReport::from_scheduler(&self.scheduler, self.options.skip_start_job)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::engine::{CoreCommand, JobOutcome};
    use crate::hierarchy::{CascadeSetup, Region, RegionTable, SplitReferenceTable, SplitSet};
    use crate::jobs::JobPlan;

    // n0 -> {n1, n2, n3}
    fn core(worker_limit: usize) -> CoreRuntime {
        let parents = [None, Some(0), Some(0), Some(0)];
        let rows = parents
            .iter()
            .enumerate()
            .map(|(id, parent)| Region { id, name: format!("n{id}"), parent: *parent })
            .collect();
        let setup = CascadeSetup {
            regions: RegionTable::new(rows).unwrap(),
            split_references: SplitReferenceTable::default(),
            split_set: SplitSet::default(),
            root_id: 0,
            root_split_reference_id: None,
            goals: vec![1, 2, 3],
            result_dir: PathBuf::from("/results"),
            database_file: "dismod.db".into(),
            max_workers: worker_limit,
            engine_program: "dismod_at".into(),
            engine_steps: Vec::new(),
        };
        let plan = JobPlan::for_cascade(&setup).unwrap();
        CoreRuntime::new(Scheduler::from_plan(&plan), RunOptions::with_workers(worker_limit))
    }

    fn dispatched(step: &CoreStep) -> Vec<JobId> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::DispatchJobs(jobs) => Some(jobs.iter().map(|j| j.job_id)),
                CoreCommand::RequestExit => None,
            })
            .flatten()
            .collect()
    }

    fn done(job_id: JobId) -> RuntimeEvent {
        RuntimeEvent::JobCompleted { job_id, outcome: JobOutcome::Success }
    }

    #[test]
    fn children_wait_for_free_workers() {
        let mut core = core(2);
        let step = core.start().unwrap();
        assert_eq!(dispatched(&step), vec![0]);

        let step = core.step(done(0));
        assert_eq!(dispatched(&step), vec![1, 2]);
        assert_eq!(core.run_state_of(3), Some(JobRunState::Ready));
        assert_eq!(core.running_jobs().len(), 2);

        let step = core.step(done(2));
        assert_eq!(dispatched(&step), vec![3]);
        assert!(step.keep_running);

        core.step(done(1));
        let step = core.step(done(3));
        assert!(!step.keep_running);
        assert!(matches!(step.commands.last(), Some(CoreCommand::RequestExit)));
        assert_eq!(core.report().completed, vec![0, 1, 2, 3]);
    }

    #[test]
    fn failed_root_blocks_everything_and_exits() {
        let mut core = core(4);
        core.start().unwrap();
        let step = core.step(RuntimeEvent::JobCompleted {
            job_id: 0,
            outcome: JobOutcome::Failed("engine crashed".into()),
        });
        assert!(!step.keep_running);

        let report = core.report();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].job_name, "n0");
        assert_eq!(report.failures[0].database, PathBuf::from("/results/n0/dismod.db"));
        assert_eq!(report.blocked, vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_completion_does_not_free_a_worker() {
        let mut core = core(1);
        core.start().unwrap();
        let step = core.step(done(0));
        assert_eq!(dispatched(&step), vec![1]);

        let step = core.step(done(0));
        assert!(dispatched(&step).is_empty());
        assert_eq!(core.running_jobs(), vec![1]);
    }

    #[test]
    fn skipped_start_is_not_reported_as_completed() {
        let mut core = core(3);
        core.options = RunOptions { skip_start_job: true, ..core.options };
        let step = core.start().unwrap();
        assert_eq!(dispatched(&step), vec![1, 2, 3]);
        for id in 1..4 {
            core.step(done(id));
        }
        let report = core.report();
        assert!(report.skipped_start_job);
        assert_eq!(report.completed, vec![1, 2, 3]);
        assert!(report.is_success());
    }
}
