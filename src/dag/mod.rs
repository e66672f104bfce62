// src/dag/mod.rs

//! DAG representation, rebuild filtering and scheduling.
//!
//! - [`graph`] builds the task dependency graph and rejects cycles.
//! - [`filter`] computes the rebuild set and applies task selection.
//! - [`scheduler`] turns a graph into the initial indegree map and ready queue.
//! - [`visualise`] renders a graph as an ASCII tree.

pub mod filter;
pub mod graph;
pub mod scheduler;
pub mod visualise;

pub use filter::{filter_rebuild_set, select_tasks, ChecksumStaleness, StalenessCheck};
pub use graph::{build_dependency_graph, DependencyGraph};
pub use scheduler::{schedule, ScheduleState};
pub use visualise::render_tree;
