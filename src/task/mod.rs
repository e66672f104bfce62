// src/task/mod.rs

//! Task registry: discovered task definitions resolved into runnable tasks.

pub mod env;
pub mod kind;
pub mod sources;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::model::{DiscoveredTask, ProjectConfig};
use crate::config::validate::validate_discovered;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::TaskName;

pub use env::{TaskEnv, PATH_SEPARATOR};
pub use kind::{CompileSpec, TaskKind, DEFAULT_VERILATOR_MAKEFILE};
pub use sources::resolve_sources;

/// A fully resolved build task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: TaskName,
    pub definition_file: PathBuf,
    pub task_dir: PathBuf,
    /// `<project>/<build_dir>/<name>`; also holds the task log.
    pub output_dir: PathBuf,
    /// Source files passed to the tool, in sorted order.
    pub sources: Vec<PathBuf>,
    /// Every file whose content decides staleness (sources plus
    /// kind-specific inputs).
    pub input_files: Vec<PathBuf>,
    pub kind: TaskKind,
    pub env: TaskEnv,
}

impl Task {
    pub fn log_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.log", self.name))
    }
}

/// All tasks of a project, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    build_dir: PathBuf,
    tasks: BTreeMap<TaskName, Task>,
}

impl TaskRegistry {
    /// Resolve `discovered` definitions into tasks.
    ///
    /// Fails if the definitions do not match the `[tasks]` declarations one
    /// to one. Each task's environment starts as a copy of `base_env`.
    pub fn from_discovered(
        fs: &dyn FileSystem,
        project_root: &Path,
        cfg: &ProjectConfig,
        discovered: Vec<DiscoveredTask>,
        base_env: &TaskEnv,
    ) -> Result<Self> {
        validate_discovered(cfg, &discovered)?;

        let build_dir = project_root.join(&cfg.config.build_dir);
        let skip = [build_dir.clone(), project_root.join(&cfg.config.state_dir)];

        let mut tasks = BTreeMap::new();
        for found in discovered {
            let def = &found.definition;
            let output_dir = build_dir.join(&def.task_name);

            let mut sources = resolve_sources(fs, &found.task_dir, &def.sources, &skip)?;
            sources.extend(resolve_sources(fs, project_root, &def.external_sources, &skip)?);
            sources.sort();
            sources.dedup();

            let kind = TaskKind::from_definition(def, project_root);

            let mut input_files = sources.clone();
            input_files.extend(kind.extra_inputs());
            input_files.sort();
            input_files.dedup();

            let mut env = base_env.clone();
            for (key, value) in def.env.iter() {
                env.update(key, value.values(), false);
            }
            kind.export_env(&mut env, &sources, &output_dir);

            debug!(
                task = %def.task_name,
                task_type = %def.task_type,
                sources = sources.len(),
                inputs = input_files.len(),
                "resolved task"
            );

            let task = Task {
                name: def.task_name.clone(),
                definition_file: found.definition_file.clone(),
                task_dir: found.task_dir.clone(),
                output_dir,
                sources,
                input_files,
                kind,
                env,
            };
            tasks.insert(task.name.clone(), task);
        }

        Ok(Self { build_dir, tasks })
    }

    /// Registry over already-resolved tasks.
    pub fn from_tasks<I>(build_dir: PathBuf, tasks: I) -> Self
    where
        I: IntoIterator<Item = Task>,
    {
        Self {
            build_dir,
            tasks: tasks.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn names(&self) -> Vec<TaskName> {
        self.tasks.keys().cloned().collect()
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Create the output directory of every task in `names`.
    pub fn setup_build_dirs<'a, I>(&self, fs: &dyn FileSystem, names: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            if let Some(task) = self.tasks.get(name) {
                fs.create_dir_all(&task.output_dir)?;
            }
        }
        Ok(())
    }

    /// Remove the output directories of `names`.
    ///
    /// Unknown names are logged and skipped. Returns how many directories
    /// were actually removed.
    pub fn clean(&self, fs: &dyn FileSystem, names: &[TaskName]) -> Result<usize> {
        let mut removed = 0usize;
        for name in names {
            let Some(task) = self.tasks.get(name) else {
                warn!(task = %name, "cannot clean unknown task");
                continue;
            };
            if fs.is_dir(&task.output_dir) {
                fs.remove_dir_all(&task.output_dir)?;
                info!(task = %name, dir = ?task.output_dir, "removed build directory");
                removed += 1;
            } else {
                debug!(task = %name, "no build directory to remove");
            }
        }
        Ok(removed)
    }
}
