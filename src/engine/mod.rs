// src/engine/mod.rs

//! Orchestration engine for bob.
//!
//! [`build`] wires the pipeline together: dependency graph, checksum store,
//! task selection, rebuild filter and scheduler. [`executor`] runs the
//! resulting rebuild set on a bounded, fail-fast worker pool.

pub mod build;
pub mod executor;

pub use build::{BuildOptions, BuildPlan, BuildReport, CleanTarget, Project};
pub use executor::{BuildFailure, BuildResult, Executor, TaskState};
