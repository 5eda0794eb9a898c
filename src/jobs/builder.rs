// src/jobs/builder.rs

//! Flattens the pruned region tree and the split dimension into one job table.

use tracing::debug;

use crate::errors::{CascadeError, Result};
use crate::hierarchy::{CascadeSetup, RegionTable, SplitReferenceTable, SplitSet, prune};
use crate::jobs::job::{Job, JobTable};
use crate::types::{NodeId, SplitReferenceId};

/// Builds job tables for one cascade configuration.
///
/// Pruning is always relative to the overall cascade root, so a table built
/// from a resume point has exactly the shape of the corresponding subtree of
/// the full table.
#[derive(Debug)]
pub struct JobTableBuilder<'a> {
    regions: &'a RegionTable,
    split_references: &'a SplitReferenceTable,
    split_set: &'a SplitSet,
    /// Split reference of the overall root fit; jobs carrying it are unsplit.
    root_split_reference_id: Option<SplitReferenceId>,
    root_id: NodeId,
    children: Vec<Vec<NodeId>>,
}

impl<'a> JobTableBuilder<'a> {
    pub fn new(
        root_id: NodeId,
        root_split_reference_id: Option<SplitReferenceId>,
        goals: &[NodeId],
        regions: &'a RegionTable,
        split_set: &'a SplitSet,
        split_references: &'a SplitReferenceTable,
    ) -> Result<Self> {
        let children = prune(root_id, goals, regions)?;
        Ok(Self {
            regions,
            split_references,
            split_set,
            root_split_reference_id,
            root_id,
            children,
        })
    }

    pub fn from_setup(setup: &'a CascadeSetup) -> Result<Self> {
        Self::new(
            setup.root_id,
            setup.root_split_reference_id,
            &setup.goals,
            &setup.regions,
            &setup.split_set,
            &setup.split_references,
        )
    }

    /// Table for the whole cascade, starting at the root fit.
    pub fn build_full(&self) -> Result<JobTable> {
        self.build_from(self.root_id, self.root_split_reference_id)
    }

    /// Table starting at an arbitrary (region, split reference) job.
    ///
    /// Jobs are expanded in table order; each expansion appends all direct
    /// children of that job as one contiguous block, which fixes the job's
    /// child range.
    pub fn build_from(
        &self,
        start_node: NodeId,
        start_split_reference_id: Option<SplitReferenceId>,
    ) -> Result<JobTable> {
        self.check_start(start_node, start_split_reference_id)?;

        let mut jobs = vec![self.new_job(0, start_node, start_split_reference_id)];
        let mut next = 0;

        while next < jobs.len() {
            let node = jobs[next].fit_node_id;
            let split = jobs[next].split_reference_id;

            let start_child = jobs.len();
            for (child_node, child_split) in self.child_jobs(node, split)? {
                let job_id = jobs.len();
                jobs.push(self.new_job(job_id, child_node, child_split));
            }

            jobs[next].start_child_job_id = start_child;
            jobs[next].end_child_job_id = jobs.len();
            next += 1;
        }

        debug!(
            start = %jobs[0].job_name,
            jobs = jobs.len(),
            "built job table"
        );

        Ok(JobTable::from_jobs(jobs))
    }

    /// Pruned children of a region (empty for regions off every goal path).
    pub fn pruned_children(&self, node: NodeId) -> &[NodeId] {
        self.children.get(node).map(|c| c.as_slice()).unwrap_or(&[])
    }

    fn check_start(&self, node: NodeId, split: Option<SplitReferenceId>) -> Result<()> {
        if self.regions.get(node).is_none() {
            return Err(CascadeError::config(format!("start region id {node} is out of range")));
        }
        if let Some(id) = split {
            if self.split_references.get(id).is_none() {
                return Err(CascadeError::config(format!(
                    "start split reference id {id} is not in the split reference table"
                )));
            }
        }
        if node == self.root_id {
            return Ok(());
        }
        let on_goal_path = self
            .regions
            .parent(node)
            .is_some_and(|parent| self.pruned_children(parent).contains(&node));
        if !on_goal_path {
            return Err(CascadeError::config(format!(
                "region '{}' is not on a path from the root to any goal region",
                self.regions.name(node)
            )));
        }
        Ok(())
    }

    /// Direct child jobs of the job fitting `node` under `split`.
    fn child_jobs(
        &self,
        node: NodeId,
        split: Option<SplitReferenceId>,
    ) -> Result<Vec<(NodeId, Option<SplitReferenceId>)>> {
        if self.split_set.contains(node) {
            if split == self.root_split_reference_id {
                return self.fan_out(node, split);
            }
            debug!(
                region = %self.regions.name(node),
                split_reference = ?self.split_references.name_of(split),
                "region already split; not splitting again"
            );
        }

        Ok(self
            .pruned_children(node)
            .iter()
            .map(|&child| (child, split))
            .collect())
    }

    fn fan_out(
        &self,
        node: NodeId,
        split: Option<SplitReferenceId>,
    ) -> Result<Vec<(NodeId, Option<SplitReferenceId>)>> {
        let targets: Vec<_> = self
            .split_references
            .iter()
            .map(|r| r.id)
            .filter(|&id| Some(id) != split)
            .map(|id| (node, Some(id)))
            .collect();

        if targets.is_empty() {
            return Err(CascadeError::config(format!(
                "region '{}' is a split region but no split references are configured",
                self.regions.name(node)
            )));
        }
        Ok(targets)
    }

    fn new_job(&self, job_id: usize, node: NodeId, split: Option<SplitReferenceId>) -> Job {
        let mut job_name = self.regions.name(node).to_string();
        if let Some(reference) = self.split_references.name_of(split) {
            job_name.push('.');
            job_name.push_str(reference);
        }
        Job {
            job_id,
            job_name,
            fit_node_id: node,
            split_reference_id: split,
            start_child_job_id: 0,
            end_child_job_id: 0,
        }
    }
}

/// One-shot form: build the table for a cascade that starts at `root_id`.
pub fn build(
    root_id: NodeId,
    root_split_reference_id: Option<SplitReferenceId>,
    goals: &[NodeId],
    regions: &RegionTable,
    split_set: &SplitSet,
    split_references: &SplitReferenceTable,
) -> Result<JobTable> {
    JobTableBuilder::new(
        root_id,
        root_split_reference_id,
        goals,
        regions,
        split_set,
        split_references,
    )?
    .build_full()
}
