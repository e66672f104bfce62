// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] provides the `TaskExecutor` trait and the production
//!   `ProcessTaskExecutor`; tests replace it with a fake.
//! - [`command`] builds the tool command lines for each task kind.
//! - [`task_runner`] runs one subprocess and writes its output to the task log.

pub mod backend;
pub mod command;
pub mod task_runner;

pub use backend::{ProcessTaskExecutor, TaskExecutor};
pub use command::{build_commands, CommandLine, ToolPaths};
