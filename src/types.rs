use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Index of a region in the [`RegionTable`](crate::hierarchy::RegionTable).
pub type NodeId = usize;

/// Index of a split reference in the
/// [`SplitReferenceTable`](crate::hierarchy::SplitReferenceTable).
pub type SplitReferenceId = usize;

/// Position of a job in the flat job table.
pub type JobId = usize;

/// Action understood by the fitting engine.
///
/// - `Init`: initialise the working database from its inputs.
/// - `Fit`: optimise the model variables.
/// - `Sample`: draw posterior samples of the model variables.
/// - `Predict`: evaluate predictions for the fitted or sampled variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitAction {
    Init,
    Fit,
    Sample,
    Predict,
}

impl FitAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitAction::Init => "init",
            FitAction::Fit => "fit",
            FitAction::Sample => "sample",
            FitAction::Predict => "predict",
        }
    }
}

impl fmt::Display for FitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FitAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "init" => Ok(FitAction::Init),
            "fit" => Ok(FitAction::Fit),
            "sample" => Ok(FitAction::Sample),
            "predict" => Ok(FitAction::Predict),
            other => Err(format!(
                "invalid engine action: {other} (expected \"init\", \"fit\", \"sample\" or \"predict\")"
            )),
        }
    }
}

/// One invocation of the fitting engine: an action plus its extra arguments,
/// e.g. `fit both` or `sample asymptotic both 20`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineStep {
    pub action: FitAction,
    #[serde(default)]
    pub args: Vec<String>,
}

impl EngineStep {
    pub fn new(action: FitAction, args: &[&str]) -> Self {
        Self {
            action,
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Steps run for every job when the configuration does not list any.
    pub fn default_steps() -> Vec<EngineStep> {
        vec![
            EngineStep::new(FitAction::Fit, &["both"]),
            EngineStep::new(FitAction::Sample, &["asymptotic", "both", "20"]),
            EngineStep::new(FitAction::Predict, &["sample"]),
        ]
    }
}

impl fmt::Display for EngineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.action)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
