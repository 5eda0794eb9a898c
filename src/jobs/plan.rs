// src/jobs/plan.rs

//! A job table together with every job's resolved storage location.

use std::path::{Path, PathBuf};

use crate::errors::Result;
use crate::hierarchy::{CascadeSetup, SplitReference, SplitReferenceTable};
use crate::jobs::builder::JobTableBuilder;
use crate::jobs::job::{Job, JobTable};
use crate::jobs::path::PathResolver;
use crate::types::{JobId, NodeId, SplitReferenceId};

/// Job table plus directories and databases, indexed by job id.
#[derive(Debug, Clone)]
pub struct JobPlan {
    table: JobTable,
    relative: Vec<PathBuf>,
    directories: Vec<PathBuf>,
    databases: Vec<PathBuf>,
    split_references: SplitReferenceTable,
}

impl JobPlan {
    /// Resolve all paths of `table`; fails on a path collision.
    pub fn new(table: JobTable, setup: &CascadeSetup) -> Result<Self> {
        let resolver = PathResolver::new(setup);
        let relative = resolver.resolve_table(&table)?;
        let directories = relative.iter().map(|p| resolver.directory(p)).collect();
        let databases = relative.iter().map(|p| resolver.database_path(p)).collect();

        Ok(Self {
            table,
            relative,
            directories,
            databases,
            split_references: setup.split_references.clone(),
        })
    }

    /// Plan for the whole cascade, starting at the root fit.
    pub fn for_cascade(setup: &CascadeSetup) -> Result<Self> {
        let table = JobTableBuilder::from_setup(setup)?.build_full()?;
        Self::new(table, setup)
    }

    /// Plan rooted at an already-fit (region, split reference) job.
    pub fn for_resume(
        setup: &CascadeSetup,
        fit_node_id: NodeId,
        split_reference_id: Option<SplitReferenceId>,
    ) -> Result<Self> {
        let table = JobTableBuilder::from_setup(setup)?.build_from(fit_node_id, split_reference_id)?;
        Self::new(table, setup)
    }

    pub fn table(&self) -> &JobTable {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn job(&self, job_id: JobId) -> Option<&Job> {
        self.table.get(job_id)
    }

    /// Directory relative to the result directory.
    pub fn relative_dir(&self, job_id: JobId) -> Option<&Path> {
        self.relative.get(job_id).map(|p| p.as_path())
    }

    pub fn directory(&self, job_id: JobId) -> Option<&Path> {
        self.directories.get(job_id).map(|p| p.as_path())
    }

    pub fn database(&self, job_id: JobId) -> Option<&Path> {
        self.databases.get(job_id).map(|p| p.as_path())
    }

    pub fn split_reference(&self, job_id: JobId) -> Option<&SplitReference> {
        self.job(job_id)
            .and_then(|j| j.split_reference_id)
            .and_then(|id| self.split_references.get(id))
    }
}
