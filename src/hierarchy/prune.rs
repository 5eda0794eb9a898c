// src/hierarchy/prune.rs

//! Reachability pruning: which children must be fit so that every goal
//! region is eventually reached from the root.

use tracing::debug;

use crate::errors::{CascadeError, Result};
use crate::hierarchy::region::RegionTable;
use crate::types::NodeId;

/// For every region, the direct children that lie on a path from `root` to
/// some goal region.
///
/// Every region on a root-to-goal path (goal included) is "required"; the
/// result for a region is its required children in ascending id order.
/// Regions off every goal path get an empty list.
pub fn prune(root: NodeId, goals: &[NodeId], regions: &RegionTable) -> Result<Vec<Vec<NodeId>>> {
    if goals.is_empty() {
        return Err(CascadeError::config("goal set is empty"));
    }
    if regions.get(root).is_none() {
        return Err(CascadeError::config(format!("root region id {root} is out of range")));
    }

    let mut required = vec![false; regions.len()];

    for &goal in goals {
        let path = regions.path_from(root, goal).ok_or_else(|| {
            let name = regions
                .get(goal)
                .map(|r| r.name.clone())
                .unwrap_or_else(|| format!("#{goal}"));
            CascadeError::config(format!(
                "goal region '{}' is not a descendant of root region '{}'",
                name,
                regions.name(root)
            ))
        })?;
        for node in path {
            required[node] = true;
        }
    }

    let children: Vec<Vec<NodeId>> = (0..regions.len())
        .map(|node| {
            if !required[node] {
                return Vec::new();
            }
            regions
                .children_of(node)
                .iter()
                .copied()
                .filter(|&child| required[child])
                .collect()
        })
        .collect();

    debug!(
        root = %regions.name(root),
        goals = goals.len(),
        required = required.iter().filter(|r| **r).count(),
        "pruned region tree"
    );

    Ok(children)
}
