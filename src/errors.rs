// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CascadeError {
    /// Malformed goal set, missing split configuration, unreachable goal or
    /// an invalid configuration file. Always raised before any job runs.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Region not found: {0}")]
    UnknownRegion(String),

    #[error("Cycle detected in region tree: {0}")]
    RegionCycle(String),

    /// Two distinct jobs resolved to the same working directory.
    #[error("Path collision: jobs '{first}' and '{second}' both resolve to {}", path.display())]
    PathCollision {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("Job '{job}' failed ({}): {detail}", database.display())]
    JobFailed {
        job: String,
        database: PathBuf,
        detail: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CascadeError {
    pub fn config(msg: impl Into<String>) -> Self {
        CascadeError::ConfigError(msg.into())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CascadeError>;
