// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::EngineStep;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [cascade]
/// root_node = "world"
/// goal = ["canada", "mexico"]
/// result_dir = "results"
/// max_workers = 4
///
/// [engine]
/// program = "dismod_at"
///
/// [split]
/// covariate = "sex"
/// root_reference = "both"
/// nodes = ["north_america"]
///
/// [[split.reference]]
/// name = "female"
/// value = -0.5
///
/// [[region]]
/// name = "world"
///
/// [[region]]
/// name = "north_america"
/// parent = "world"
/// ```
///
/// Deserialized as-is; see [`ConfigFile`] for the validated form.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    pub cascade: CascadeSection,

    #[serde(default)]
    pub engine: EngineSection,

    /// Optional covariate split from `[split]`.
    #[serde(default)]
    pub split: Option<SplitSection>,

    /// Region table from `[[region]]`, in table order.
    #[serde(default)]
    pub region: Vec<RegionConfig>,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (or
/// [`ConfigFile::new_unchecked`] by code that already validated).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub cascade: CascadeSection,
    pub engine: EngineSection,
    pub split: Option<SplitSection>,
    pub region: Vec<RegionConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        cascade: CascadeSection,
        engine: EngineSection,
        split: Option<SplitSection>,
        region: Vec<RegionConfig>,
    ) -> Self {
        Self {
            cascade,
            engine,
            split,
            region,
        }
    }
}

/// `[cascade]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CascadeSection {
    /// Name of the region where the whole cascade starts.
    pub root_node: String,

    /// Regions whose fits are ultimately wanted.
    #[serde(default)]
    pub goal: Vec<String>,

    /// Directory under which every job's working directory lives.
    #[serde(default = "default_result_dir")]
    pub result_dir: PathBuf,

    /// File name of the working database inside each job directory.
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Upper bound on concurrently running jobs.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_result_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_database_file() -> String {
    "dismod.db".to_string()
}

fn default_max_workers() -> usize {
    1
}

/// `[engine]` section: how to invoke the external fitting engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_program")]
    pub program: String,

    /// `[[engine.step]]` entries, run in order for every job.
    ///
    /// Empty means [`EngineStep::default_steps`].
    #[serde(default, rename = "step")]
    pub steps: Vec<EngineStep>,
}

fn default_program() -> String {
    "dismod_at".to_string()
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            program: default_program(),
            steps: Vec::new(),
        }
    }
}

impl EngineSection {
    pub fn effective_steps(&self) -> Vec<EngineStep> {
        if self.steps.is_empty() {
            EngineStep::default_steps()
        } else {
            self.steps.clone()
        }
    }
}

/// `[split]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SplitSection {
    /// Name of the covariate the split is over (informational).
    #[serde(default)]
    pub covariate: Option<String>,

    /// Reference that the root fit uses, e.g. `"both"`.
    #[serde(default)]
    pub root_reference: Option<String>,

    /// Regions at which the fit fans out over the references.
    #[serde(default)]
    pub nodes: Vec<String>,

    /// Every region this many levels below `cascade.root_node` is also a
    /// split region.
    #[serde(default)]
    pub level: Option<usize>,

    /// `[[split.reference]]` entries, in index order.
    #[serde(default, rename = "reference")]
    pub references: Vec<SplitReferenceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SplitReferenceConfig {
    pub name: String,
    #[serde(default)]
    pub value: Option<f64>,
}

/// `[[region]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}
