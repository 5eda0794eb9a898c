// src/hierarchy/region.rs

//! In-memory region tree.

use std::collections::HashMap;

use crate::config::model::RegionConfig;
use crate::errors::{CascadeError, Result};
use crate::types::NodeId;

/// Placeholder name reported for ids outside the table.
pub const UNKNOWN_REGION: &str = "<unknown region>";

/// One region of the fitting hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub id: NodeId,
    pub name: String,
    pub parent: Option<NodeId>,
}

/// Regions indexed by [`NodeId`], plus a child index.
///
/// Acyclicity and the single-root property are checked in
/// `config::validate`; [`RegionTable::new`] only checks what it needs to
/// build the index (known parent ids, unique names).
#[derive(Debug, Clone)]
pub struct RegionTable {
    regions: Vec<Region>,
    children: Vec<Vec<NodeId>>,
    by_name: HashMap<String, NodeId>,
}

impl RegionTable {
    /// Build from `(name, parent)` rows; ids are row positions.
    pub fn new(regions: Vec<Region>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(regions.len());
        let mut children = vec![Vec::new(); regions.len()];

        for (index, region) in regions.iter().enumerate() {
            if region.id != index {
                return Err(CascadeError::config(format!(
                    "region '{}' has id {} but is stored at position {}",
                    region.name, region.id, index
                )));
            }
            if by_name.insert(region.name.clone(), index).is_some() {
                return Err(CascadeError::config(format!(
                    "region '{}' appears more than once",
                    region.name
                )));
            }
        }

        for region in &regions {
            if let Some(parent) = region.parent {
                let slot = children.get_mut(parent).ok_or_else(|| {
                    CascadeError::config(format!(
                        "region '{}' has out-of-range parent id {}",
                        region.name, parent
                    ))
                })?;
                slot.push(region.id);
            }
        }

        Ok(Self {
            regions,
            children,
            by_name,
        })
    }

    /// Build from the `[[region]]` entries of a configuration file.
    pub fn from_config(rows: &[RegionConfig]) -> Result<Self> {
        let ids: HashMap<&str, NodeId> = rows
            .iter()
            .enumerate()
            .map(|(id, row)| (row.name.as_str(), id))
            .collect();

        let mut regions = Vec::with_capacity(rows.len());
        for (id, row) in rows.iter().enumerate() {
            let parent = match &row.parent {
                None => None,
                Some(name) => Some(
                    ids.get(name.as_str())
                        .copied()
                        .ok_or_else(|| CascadeError::UnknownRegion(name.clone()))?,
                ),
            };
            regions.push(Region {
                id,
                name: row.name.clone(),
                parent,
            });
        }

        Self::new(regions)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Region> {
        self.regions.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    /// Name of a region, or [`UNKNOWN_REGION`] for an id outside this table.
    pub fn name(&self, id: NodeId) -> &str {
        self.regions
            .get(id)
            .map(|r| r.name.as_str())
            .unwrap_or(UNKNOWN_REGION)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.regions.get(id).and_then(|r| r.parent)
    }

    /// Direct children in ascending id order.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.children.get(id).map(|c| c.as_slice()).unwrap_or(&[])
    }

    pub fn id_of(&self, name: &str) -> Result<NodeId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| CascadeError::UnknownRegion(name.to_string()))
    }

    /// Path from `root` down to `node`, both inclusive.
    ///
    /// Returns `None` if `node` is not `root` or one of its descendants.
    pub fn path_from(&self, root: NodeId, node: NodeId) -> Option<Vec<NodeId>> {
        let mut path = vec![node];
        let mut current = node;
        // A walk longer than the table means a cycle slipped through.
        for _ in 0..=self.regions.len() {
            if current == root {
                path.reverse();
                return Some(path);
            }
            current = self.parent(current)?;
            path.push(current);
        }
        None
    }

    /// Number of levels between `root` and `node` (0 for the root itself).
    pub fn depth_below(&self, root: NodeId, node: NodeId) -> Option<usize> {
        self.path_from(root, node).map(|p| p.len() - 1)
    }
}
