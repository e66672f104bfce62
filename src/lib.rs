// src/lib.rs

pub mod cache;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod task;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::{BuildArgs, CleanArgs, CliArgs, Command};
use crate::dag::{render_tree, DependencyGraph};
use crate::engine::{BuildOptions, CleanTarget, Project};
use crate::exec::{ProcessTaskExecutor, ToolPaths};
use crate::fs::{FileSystem, RealFileSystem};

/// High-level entry point used by `main.rs`.
///
/// Returns `Ok(false)` when a build ran but failed.
pub async fn run(args: CliArgs) -> Result<bool> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let config_path = PathBuf::from(&args.config);
    let project = Project::load(Arc::clone(&fs), &config_path)?;

    match args.command {
        Command::Build(build) => run_build(&project, build).await,
        Command::Clean(clean) => {
            run_clean(&project, clean)?;
            Ok(true)
        }
    }
}

async fn run_build(project: &Project, args: BuildArgs) -> Result<bool> {
    if args.dry_run {
        let plan = project.plan(&args.task)?;
        print_dry_run(&plan.rebuild, plan.skipped());
        return Ok(true);
    }

    let tools = ToolPaths::new(project.config().tools.clone());
    let backend = Arc::new(ProcessTaskExecutor::new(tools));

    let options = BuildOptions {
        patterns: args.task,
        jobs: args.jobs,
    };
    let report = project.build(backend, &options).await?;
    Ok(report.success())
}

fn run_clean(project: &Project, args: CleanArgs) -> Result<()> {
    let target = if args.up_to.is_empty() {
        CleanTarget::All
    } else {
        CleanTarget::Tasks(args.up_to)
    };
    let removed = project.clean(&target)?;
    info!(removed, "clean finished");
    Ok(())
}

/// Print the rebuild set as a dependency tree.
fn print_dry_run(rebuild: &DependencyGraph, skipped: usize) {
    println!("bob dry-run");
    println!("  tasks to rebuild: {}", rebuild.len());
    println!("  up to date: {skipped}");
    println!();

    if rebuild.is_empty() {
        println!("nothing to do");
    } else {
        println!("Dependency Graph Visualisation:");
        println!();
        print!("{}", render_tree(rebuild));
    }

    debug!("dry-run complete (no execution)");
}
