// src/hierarchy/split.rs

//! Covariate split references and the set of regions that fan out over them.

use std::collections::BTreeSet;

use crate::config::model::SplitSection;
use crate::errors::{CascadeError, Result};
use crate::hierarchy::region::RegionTable;
use crate::types::{NodeId, SplitReferenceId};

/// One value of the split covariate, e.g. `female` with reference `-0.5`.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitReference {
    pub id: SplitReferenceId,
    pub name: String,
    pub value: Option<f64>,
}

/// Ordered split references; ids are positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitReferenceTable {
    references: Vec<SplitReference>,
}

impl SplitReferenceTable {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let references = names
            .into_iter()
            .enumerate()
            .map(|(id, name)| SplitReference {
                id,
                name: name.into(),
                value: None,
            })
            .collect();
        Self { references }
    }

    pub fn from_config(section: &SplitSection) -> Self {
        let references = section
            .references
            .iter()
            .enumerate()
            .map(|(id, r)| SplitReference {
                id,
                name: r.name.clone(),
                value: r.value,
            })
            .collect();
        Self { references }
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn get(&self, id: SplitReferenceId) -> Option<&SplitReference> {
        self.references.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SplitReference> {
        self.references.iter()
    }

    pub fn id_of(&self, name: &str) -> Result<SplitReferenceId> {
        self.references
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| CascadeError::config(format!("unknown split reference '{name}'")))
    }

    /// Label for an optional reference id (`None` has no label).
    pub fn name_of(&self, id: Option<SplitReferenceId>) -> Option<&str> {
        id.and_then(|id| self.get(id)).map(|r| r.name.as_str())
    }
}

/// Regions at which a job fans out across the split references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitSet {
    nodes: BTreeSet<NodeId>,
}

impl SplitSet {
    pub fn new(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
        }
    }

    /// Resolve `[split].nodes` and `[split].level` against the region table.
    ///
    /// `level` counts levels below `root`: level 0 is the root itself.
    pub fn from_config(section: &SplitSection, regions: &RegionTable, root: NodeId) -> Result<Self> {
        let mut nodes = BTreeSet::new();
        for name in &section.nodes {
            nodes.insert(regions.id_of(name)?);
        }
        if let Some(level) = section.level {
            for region in regions.iter() {
                if regions.depth_below(root, region.id) == Some(level) {
                    nodes.insert(region.id);
                }
            }
        }
        Ok(Self { nodes })
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }
}
