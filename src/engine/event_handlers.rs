// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{debug, warn};

use crate::dag::{JobRunState, ScheduledJob, Scheduler};
use crate::engine::queue::DispatchQueue;
use crate::engine::{JobOutcome, RunOptions};
use crate::errors::Result;
use crate::types::JobId;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Hand these jobs to the backend.
    DispatchJobs(Vec<ScheduledJob>),
    /// Every participating job is terminal; the run is over.
    RequestExit,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep waiting for events.
    pub keep_running: bool,
}

/// Start the run described by `options` and dispatch the first jobs.
pub fn start_run(
    scheduler: &mut Scheduler,
    queue: &mut DispatchQueue,
    options: &RunOptions,
) -> Result<CoreStep> {
    let step = scheduler.start_run(options.start_job_id, options.skip_start_job)?;
    queue.push_ready(step.newly_ready);
    Ok(finish_step(scheduler, queue))
}

/// Handle a job completion event.
///
/// The worker is released only for a job that was actually running, so a
/// stray or duplicate completion cannot inflate the free worker count.
pub fn handle_job_completion(
    scheduler: &mut Scheduler,
    queue: &mut DispatchQueue,
    job_id: JobId,
    outcome: JobOutcome,
) -> CoreStep {
    if scheduler.run_state_of(job_id) == Some(JobRunState::Running) {
        queue.release();
    } else {
        warn!(job_id, "completion for a job that is not running");
    }

    let step = scheduler.step_completion(job_id, outcome);
    if !step.newly_blocked.is_empty() {
        debug!(job_id, blocked = ?step.newly_blocked, "descendants blocked");
    }
    queue.push_ready(step.newly_ready);

    finish_step(scheduler, queue)
}

/// Admit queued jobs to free workers and decide whether the run continues.
fn finish_step(scheduler: &mut Scheduler, queue: &mut DispatchQueue) -> CoreStep {
    let mut commands = Vec::new();

    let dispatch = dispatch_admitted(scheduler, queue);
    if !dispatch.is_empty() {
        commands.push(CoreCommand::DispatchJobs(dispatch));
    }

    let keep_running = !scheduler.is_idle();
    if !keep_running {
        commands.push(CoreCommand::RequestExit);
    }

    CoreStep {
        commands,
        keep_running,
    }
}

fn dispatch_admitted(scheduler: &mut Scheduler, queue: &mut DispatchQueue) -> Vec<ScheduledJob> {
    let mut jobs = Vec::new();
    for job_id in queue.admit() {
        match scheduler.mark_running(job_id) {
            Some(job) => jobs.push(job),
            None => {
                warn!(job_id, "admitted job could not be dispatched; freeing its worker");
                queue.release();
            }
        }
    }
    jobs
}
