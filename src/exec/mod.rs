// src/exec/mod.rs

//! Job execution layer.
//!
//! This module is responsible for actually running dispatched jobs and
//! reporting back to the orchestration runtime via `RuntimeEvent`s.
//!
//! - [`backend`] provides the `JobBackend` trait and the concrete
//!   `RealJobBackend` that the runtime uses in production, and which tests
//!   can replace with a fake implementation.
//! - [`job_runner`] performs the steps of a single job.
//! - [`engine`] defines the fitting-engine collaborator.
//! - [`derive`] defines the database-derivation collaborator.
//! - [`shared`] holds the cascade log that all jobs append to.

use std::future::Future;
use std::pin::Pin;

pub mod backend;
pub mod derive;
pub mod engine;
pub mod job_runner;
pub mod shared;

/// Boxed future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use backend::{JobBackend, JobResources, RealJobBackend};
pub use derive::{CopyDeriver, DatabaseDeriver};
pub use engine::{CommandFitEngine, FitEngine};
pub use shared::{CascadeLog, LogRecord, MessageType, SharedState};
