// src/jobs/path.rs

//! Deterministic storage locations for job working databases.
//!
//! A job's directory is one segment per tree level from the overall cascade
//! root down to the job's region. The split-reference label is inserted
//! right after the region where the fan-out happened (the first split region
//! on the path), and only when the job's reference differs from the root
//! reference:
//!
//! ```text
//! n0                 root fit
//! n0/male            n0 split by male
//! n0/male/n1         n1 under the male split
//! ```

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::errors::{CascadeError, Result};
use crate::hierarchy::CascadeSetup;
use crate::jobs::job::{Job, JobTable};
use crate::types::{NodeId, SplitReferenceId};

/// Maps job identities to directories. Pure: the same (region, split
/// reference) always resolves to the same path, whatever the job id.
#[derive(Debug, Clone, Copy)]
pub struct PathResolver<'a> {
    setup: &'a CascadeSetup,
}

impl<'a> PathResolver<'a> {
    pub fn new(setup: &'a CascadeSetup) -> Self {
        Self { setup }
    }

    /// Directory of a job relative to the result directory.
    pub fn resolve(
        &self,
        fit_node_id: NodeId,
        split_reference_id: Option<SplitReferenceId>,
    ) -> Result<PathBuf> {
        let setup = self.setup;
        let regions = &setup.regions;

        let lineage = regions.path_from(setup.root_id, fit_node_id).ok_or_else(|| {
            CascadeError::config(format!(
                "region '{}' is not below cascade root '{}'",
                regions.get(fit_node_id).map(|r| r.name.as_str()).unwrap_or("?"),
                regions.name(setup.root_id)
            ))
        })?;

        let label = self.split_label(split_reference_id)?;
        let fan_out_node = match label {
            None => None,
            Some(label) => {
                let node = lineage
                    .iter()
                    .copied()
                    .find(|&n| setup.split_set.contains(n))
                    .ok_or_else(|| {
                        CascadeError::config(format!(
                            "region '{}' carries split reference '{}' but no split region lies on its path",
                            regions.name(fit_node_id),
                            label
                        ))
                    })?;
                Some((node, label))
            }
        };

        let mut path = PathBuf::new();
        for node in lineage {
            path.push(regions.name(node));
            if let Some((split_node, label)) = fan_out_node {
                if split_node == node {
                    path.push(label);
                }
            }
        }
        Ok(path)
    }

    pub fn resolve_job(&self, job: &Job) -> Result<PathBuf> {
        self.resolve(job.fit_node_id, job.split_reference_id)
    }

    /// Absolute job directory: `result_dir/relative`.
    pub fn directory(&self, relative: &Path) -> PathBuf {
        self.setup.result_dir.join(relative)
    }

    /// Working database: `result_dir/relative/database_file`.
    pub fn database_path(&self, relative: &Path) -> PathBuf {
        self.directory(relative).join(&self.setup.database_file)
    }

    /// Resolve every job of a table, failing if two jobs share a directory.
    pub fn resolve_table(&self, table: &JobTable) -> Result<Vec<PathBuf>> {
        let mut seen: HashMap<PathBuf, usize> = HashMap::with_capacity(table.len());
        let mut paths = Vec::with_capacity(table.len());

        for job in table.iter() {
            let path = self.resolve_job(job)?;
            if let Some(&other) = seen.get(&path) {
                return Err(CascadeError::PathCollision {
                    path,
                    first: table.jobs()[other].job_name.clone(),
                    second: job.job_name.clone(),
                });
            }
            seen.insert(path.clone(), job.job_id);
            paths.push(path);
        }

        Ok(paths)
    }

    /// Inverse of [`resolve`](Self::resolve).
    ///
    /// Accepts a job directory or working database path, either relative to
    /// the result directory or prefixed by it.
    pub fn locate(&self, path: &Path) -> Result<(NodeId, Option<SplitReferenceId>)> {
        let setup = self.setup;
        let regions = &setup.regions;

        let mut relative = path.strip_prefix(&setup.result_dir).unwrap_or(path);
        if relative.file_name().and_then(|n| n.to_str()) == Some(setup.database_file.as_str()) {
            relative = relative.parent().unwrap_or(relative);
        }

        let segments: Vec<&str> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();

        let not_found = || {
            CascadeError::config(format!(
                "'{}' is not a job directory of this cascade",
                path.display()
            ))
        };

        let (first, rest) = segments.split_first().ok_or_else(not_found)?;
        if *first != regions.name(setup.root_id) {
            return Err(not_found());
        }

        let mut node = setup.root_id;
        let mut split = setup.root_split_reference_id;
        let mut split_taken = false;

        for segment in rest {
            if !split_taken && setup.split_set.contains(node) {
                let reference = setup
                    .split_references
                    .iter()
                    .find(|r| r.name == *segment && Some(r.id) != setup.root_split_reference_id);
                if let Some(reference) = reference {
                    split = Some(reference.id);
                    split_taken = true;
                    continue;
                }
            }
            node = regions
                .children_of(node)
                .iter()
                .copied()
                .find(|&child| regions.name(child) == *segment)
                .ok_or_else(not_found)?;
        }

        if self.resolve(node, split)? != relative {
            return Err(not_found());
        }
        Ok((node, split))
    }

    fn split_label(&self, split_reference_id: Option<SplitReferenceId>) -> Result<Option<&'a str>> {
        let setup = self.setup;
        if split_reference_id == setup.root_split_reference_id {
            return Ok(None);
        }
        match split_reference_id {
            None => Err(CascadeError::config(
                "job has no split reference but the cascade root has one",
            )),
            Some(id) => setup
                .split_references
                .get(id)
                .map(|r| Some(r.name.as_str()))
                .ok_or_else(|| {
                    CascadeError::config(format!("split reference id {id} is out of range"))
                }),
        }
    }
}
