// src/jobs/mod.rs

//! Job table construction and storage addressing.
//!
//! - [`job`] defines `Job` and the flat `JobTable`.
//! - [`builder`] flattens the pruned region tree and the split dimension
//!   into a job table with contiguous child ranges.
//! - [`path`] maps a job's structural identity to its directory.
//! - [`plan`] pairs a table with every job's resolved paths.

pub mod builder;
pub mod job;
pub mod path;
pub mod plan;

pub use builder::{JobTableBuilder, build};
pub use job::{Job, JobTable};
pub use path::PathResolver;
pub use plan::JobPlan;
