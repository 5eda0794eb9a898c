// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::types::JobId;

/// Structured result of a single scheduler "step".
///
/// This is useful for tests that want to manually step the job tree and make
/// assertions about what changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Jobs whose parent just finished; they wait for a free worker.
    pub newly_ready: Vec<JobId>,
    /// The job that failed in this step, if any.
    pub newly_failed: Vec<JobId>,
    /// Descendants of a failed job that can no longer run.
    pub newly_blocked: Vec<JobId>,
    /// Whether this step left no job pending, ready or running.
    pub run_just_finished: bool,
}
