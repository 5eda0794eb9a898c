// src/hierarchy/mod.rs

//! Node hierarchy model.
//!
//! - [`region`] holds the region tree (`RegionTable`).
//! - [`split`] holds the split references and the split set.
//! - [`prune`] computes which children must be fit to reach the goal set.
//! - [`CascadeSetup`] bundles everything the job builder and path resolver
//!   need, resolved from a validated configuration.

pub mod prune;
pub mod region;
pub mod split;

use std::path::PathBuf;

pub use prune::prune;
pub use region::{Region, RegionTable};
pub use split::{SplitReference, SplitReferenceTable, SplitSet};

use crate::config::model::ConfigFile;
use crate::errors::Result;
use crate::types::{EngineStep, NodeId, SplitReferenceId};

/// Everything a cascade needs, with names resolved to ids.
#[derive(Debug, Clone)]
pub struct CascadeSetup {
    pub regions: RegionTable,
    pub split_references: SplitReferenceTable,
    pub split_set: SplitSet,
    /// Overall root of the cascade; paths are relative to it.
    pub root_id: NodeId,
    /// Split reference of the root fit (`None` when no split is configured
    /// or the root reference is not one of the table entries).
    pub root_split_reference_id: Option<SplitReferenceId>,
    pub goals: Vec<NodeId>,
    pub result_dir: PathBuf,
    pub database_file: String,
    pub max_workers: usize,
    pub engine_program: String,
    pub engine_steps: Vec<EngineStep>,
}

impl CascadeSetup {
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let regions = RegionTable::from_config(&cfg.region)?;
        let root_id = regions.id_of(&cfg.cascade.root_node)?;

        let goals = cfg
            .cascade
            .goal
            .iter()
            .map(|name| regions.id_of(name))
            .collect::<Result<Vec<_>>>()?;

        let (split_references, split_set, root_split_reference_id) = match &cfg.split {
            None => (SplitReferenceTable::default(), SplitSet::default(), None),
            Some(section) => {
                let table = SplitReferenceTable::from_config(section);
                let set = SplitSet::from_config(section, &regions, root_id)?;
                let root_ref = match &section.root_reference {
                    Some(name) => Some(table.id_of(name)?),
                    None => None,
                };
                (table, set, root_ref)
            }
        };

        Ok(Self {
            regions,
            split_references,
            split_set,
            root_id,
            root_split_reference_id,
            goals,
            result_dir: cfg.cascade.result_dir.clone(),
            database_file: cfg.cascade.database_file.clone(),
            max_workers: cfg.cascade.max_workers,
            engine_program: cfg.engine.program.clone(),
            engine_steps: cfg.engine.effective_steps(),
        })
    }

    /// Pruned children for the configured root and goal set.
    pub fn pruned_children(&self) -> Result<Vec<Vec<NodeId>>> {
        prune(self.root_id, &self.goals, &self.regions)
    }
}
