// src/config/validate.rs

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, SplitSection};
use crate::errors::{CascadeError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = CascadeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.cascade,
            raw.engine,
            raw.split,
            raw.region,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_regions(cfg)?;
    validate_cascade_section(cfg)?;
    validate_region_names(cfg)?;
    validate_region_parents(cfg)?;
    validate_region_tree(cfg)?;
    if let Some(split) = &cfg.split {
        validate_split(cfg, split)?;
    }
    Ok(())
}

fn ensure_has_regions(cfg: &RawConfigFile) -> Result<()> {
    if cfg.region.is_empty() {
        return Err(CascadeError::config(
            "config must contain at least one [[region]] entry",
        ));
    }
    Ok(())
}

fn validate_cascade_section(cfg: &RawConfigFile) -> Result<()> {
    let section = &cfg.cascade;

    if section.max_workers == 0 {
        return Err(CascadeError::config(
            "[cascade].max_workers must be >= 1 (got 0)",
        ));
    }

    if section.goal.is_empty() {
        return Err(CascadeError::config(
            "[cascade].goal must name at least one region",
        ));
    }

    if !is_path_segment(&section.database_file) {
        return Err(CascadeError::config(format!(
            "[cascade].database_file '{}' must be a plain file name",
            section.database_file
        )));
    }

    let known = region_names(cfg);
    if !known.contains(section.root_node.as_str()) {
        return Err(CascadeError::config(format!(
            "[cascade].root_node '{}' is not in the region table",
            section.root_node
        )));
    }
    for goal in &section.goal {
        if !known.contains(goal.as_str()) {
            return Err(CascadeError::config(format!(
                "goal region '{goal}' is not in the region table"
            )));
        }
    }

    Ok(())
}

fn validate_region_names(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for region in &cfg.region {
        if !is_path_segment(&region.name) {
            return Err(CascadeError::config(format!(
                "region name '{}' cannot be used as a directory name",
                region.name
            )));
        }
        if !seen.insert(region.name.as_str()) {
            return Err(CascadeError::config(format!(
                "region '{}' appears more than once",
                region.name
            )));
        }
    }
    Ok(())
}

fn validate_region_parents(cfg: &RawConfigFile) -> Result<()> {
    let known = region_names(cfg);
    let mut roots = Vec::new();

    for region in &cfg.region {
        match &region.parent {
            None => roots.push(region.name.as_str()),
            Some(parent) if parent == &region.name => {
                return Err(CascadeError::config(format!(
                    "region '{}' cannot be its own parent",
                    region.name
                )));
            }
            Some(parent) if !known.contains(parent.as_str()) => {
                return Err(CascadeError::config(format!(
                    "region '{}' has unknown parent '{}'",
                    region.name, parent
                )));
            }
            Some(_) => {}
        }
    }

    if roots.len() != 1 {
        return Err(CascadeError::config(format!(
            "region table must have exactly one region without a parent (found {}: {:?})",
            roots.len(),
            roots
        )));
    }

    Ok(())
}

fn validate_region_tree(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: parent -> child.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for region in &cfg.region {
        graph.add_node(region.name.as_str());
    }
    for region in &cfg.region {
        if let Some(parent) = &region.parent {
            graph.add_edge(parent.as_str(), region.name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(CascadeError::RegionCycle(format!(
            "cycle detected in region parents involving region '{}'",
            cycle.node_id()
        ))),
    }
}

fn validate_split(cfg: &RawConfigFile, split: &SplitSection) -> Result<()> {
    let mut seen = HashSet::new();
    for reference in &split.references {
        if !is_path_segment(&reference.name) {
            return Err(CascadeError::config(format!(
                "split reference name '{}' cannot be used as a directory name",
                reference.name
            )));
        }
        if !seen.insert(reference.name.as_str()) {
            return Err(CascadeError::config(format!(
                "split reference '{}' appears more than once",
                reference.name
            )));
        }
    }

    if let Some(root_reference) = &split.root_reference {
        if !seen.contains(root_reference.as_str()) {
            return Err(CascadeError::config(format!(
                "[split].root_reference '{root_reference}' is not one of the split references"
            )));
        }
    }

    let known = region_names(cfg);
    for node in &split.nodes {
        if !known.contains(node.as_str()) {
            return Err(CascadeError::config(format!(
                "split region '{node}' is not in the region table"
            )));
        }
    }

    let has_split_regions = !split.nodes.is_empty() || split.level.is_some();
    if has_split_regions && split.references.is_empty() {
        return Err(CascadeError::config(
            "[split] names split regions but has no [[split.reference]] entries",
        ));
    }

    Ok(())
}

fn region_names(cfg: &RawConfigFile) -> HashSet<&str> {
    cfg.region.iter().map(|r| r.name.as_str()).collect()
}

/// Names become directory names, so they must be a single normal component.
fn is_path_segment(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}
