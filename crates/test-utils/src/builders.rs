#![allow(dead_code)]

use std::path::{Path, PathBuf};

use cascade::config::{
    CascadeSection, ConfigFile, EngineSection, RawConfigFile, RegionConfig, SplitReferenceConfig,
    SplitSection,
};
use cascade::hierarchy::CascadeSetup;
use cascade::types::{EngineStep, FitAction};

/// Builder for cascade configurations to simplify test setup.
///
/// ```ignore
/// let setup = CascadeConfigBuilder::new("n0")
///     .child("n0", "n1")
///     .child("n0", "n2")
///     .goal("n1")
///     .setup();
/// ```
pub struct CascadeConfigBuilder {
    config: RawConfigFile,
}

impl CascadeConfigBuilder {
    /// Start with a single root region and no goals.
    pub fn new(root: &str) -> Self {
        Self {
            config: RawConfigFile {
                cascade: CascadeSection {
                    root_node: root.to_string(),
                    goal: Vec::new(),
                    result_dir: PathBuf::from("results"),
                    database_file: "dismod.db".to_string(),
                    max_workers: 1,
                },
                engine: EngineSection::default(),
                split: None,
                region: vec![RegionConfig {
                    name: root.to_string(),
                    parent: None,
                }],
            },
        }
    }

    pub fn child(mut self, parent: &str, name: &str) -> Self {
        self.config.region.push(RegionConfig {
            name: name.to_string(),
            parent: Some(parent.to_string()),
        });
        self
    }

    /// Add a parentless region (only useful for negative tests).
    pub fn orphan(mut self, name: &str) -> Self {
        self.config.region.push(RegionConfig {
            name: name.to_string(),
            parent: None,
        });
        self
    }

    pub fn goal(mut self, name: &str) -> Self {
        self.config.cascade.goal.push(name.to_string());
        self
    }

    pub fn result_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.cascade.result_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn database_file(mut self, name: &str) -> Self {
        self.config.cascade.database_file = name.to_string();
        self
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.config.cascade.max_workers = n;
        self
    }

    pub fn engine_program(mut self, program: &str) -> Self {
        self.config.engine.program = program.to_string();
        self
    }

    pub fn engine_step(mut self, action: FitAction, args: &[&str]) -> Self {
        self.config.engine.steps.push(EngineStep::new(action, args));
        self
    }

    /// Configure split references; the first call creates the `[split]`
    /// section.
    pub fn split_references(mut self, root_reference: Option<&str>, names: &[&str]) -> Self {
        let split = self.split_section();
        split.root_reference = root_reference.map(str::to_string);
        split.references = names
            .iter()
            .enumerate()
            .map(|(i, name)| SplitReferenceConfig {
                name: name.to_string(),
                value: Some(i as f64 - 0.5),
            })
            .collect();
        self
    }

    pub fn split_at(mut self, node: &str) -> Self {
        self.split_section().nodes.push(node.to_string());
        self
    }

    pub fn split_level(mut self, level: usize) -> Self {
        self.split_section().level = Some(level);
        self
    }

    fn split_section(&mut self) -> &mut SplitSection {
        self.config.split.get_or_insert_with(|| SplitSection {
            covariate: Some("sex".to_string()),
            root_reference: None,
            nodes: Vec::new(),
            level: None,
            references: Vec::new(),
        })
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    pub fn setup(self) -> CascadeSetup {
        CascadeSetup::from_config(&self.build()).expect("Failed to resolve cascade setup")
    }
}

/// The three-region tree `n0 -> {n1, n2}` with both leaves as goals.
pub fn three_region_tree() -> CascadeConfigBuilder {
    CascadeConfigBuilder::new("n0")
        .child("n0", "n1")
        .child("n0", "n2")
        .goal("n1")
        .goal("n2")
}

/// The same tree split at `n0` into female/male from the root reference
/// `both`.
pub fn split_tree() -> CascadeConfigBuilder {
    three_region_tree()
        .split_references(Some("both"), &["female", "both", "male"])
        .split_at("n0")
}
