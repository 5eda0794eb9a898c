// src/engine/mod.rs

//! Orchestration engine for a cascade run.
//!
//! This module ties together:
//! - the job-tree scheduler
//! - the dispatch queue (eligible jobs waiting for a free worker)
//! - the main runtime event loop that reacts to job completion events
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::types::JobId;

/// Outcome of a job for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    /// The job failed; carries a human-readable detail.
    Failed(String),
}

/// Options for one execution of a job table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Root of the subtree that participates in this run.
    pub start_job_id: JobId,
    /// Maximum number of jobs running at once (at least 1).
    pub worker_limit: usize,
    /// Treat the start job as already complete.
    pub skip_start_job: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            start_job_id: 0,
            worker_limit: 1,
            skip_start_job: false,
        }
    }
}

impl RunOptions {
    pub fn with_workers(worker_limit: usize) -> Self {
        Self {
            worker_limit,
            ..Self::default()
        }
    }
}

/// Events flowing into the runtime from the job backend.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A job finished with a concrete outcome.
    JobCompleted { job_id: JobId, outcome: JobOutcome },
}

pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod report;
pub mod runtime;

pub use self::core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::DispatchQueue;
pub use report::{CascadeReport, JobFailure};
pub use runtime::Runtime;
