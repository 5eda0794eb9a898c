// src/dag/mod.rs

//! Job tree scheduling.
//!
//! - [`scheduler`] contains the per-run state machine that decides which
//!   jobs are eligible to run, and what happens after a failure.
//! - [`job_info`] provides job metadata and scheduled job types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.

pub mod job_info;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;

pub use job_info::{ChildDatabase, JobRunState, ScheduledJob};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
