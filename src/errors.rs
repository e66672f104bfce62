// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Structural errors (`ConfigError`, `DagCycle`) are raised before any task
//! runs and abort the build. Checksum store errors are mostly recovered from
//! by the store itself; see [`crate::cache::ChecksumStore`].

use std::path::PathBuf;

use thiserror::Error;

use crate::types::TaskName;

#[derive(Error, Debug)]
pub enum BobError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cycle detected in task dependency graph: {0}")]
    DagCycle(String),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskName),

    #[error("Checksum store not found at {0:?}; it must be created before loading")]
    ChecksumStoreMissing(PathBuf),

    #[error("Checksum store at {path:?} is corrupted: {reason}")]
    ChecksumCorruption { path: PathBuf, reason: String },

    #[error("Rejected checksum store write: {0}")]
    ChecksumValidation(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BobError>;
