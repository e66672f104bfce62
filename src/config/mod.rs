// src/config/mod.rs

//! Configuration loading and validation for bob.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load the project file and discover task definitions (`loader.rs`).
//! - Validate structure and declared/defined consistency (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{discover_task_definitions, load_and_validate, load_from_path, project_root};
pub use model::{
    ConfigSection, DiscoveredTask, EnvValue, ProjectConfig, RawProjectConfig, TaskDeclaration,
    TaskDefinition,
};
pub use validate::validate_discovered;
