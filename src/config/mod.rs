// src/config/mod.rs

//! Configuration loading and validation for cascade runs.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate the region tree, goal list and split settings (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{
    CascadeSection, ConfigFile, EngineSection, RawConfigFile, RegionConfig, SplitReferenceConfig,
    SplitSection,
};
