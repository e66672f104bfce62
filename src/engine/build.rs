// src/engine/build.rs

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use crate::cache::{ChecksumStore, Checksums};
use crate::config::loader::{discover_task_definitions, load_and_validate, project_root};
use crate::config::model::ProjectConfig;
use crate::dag::{
    build_dependency_graph, filter_rebuild_set, schedule, select_tasks, ChecksumStaleness,
    DependencyGraph,
};
use crate::engine::executor::{BuildResult, Executor};
use crate::errors::Result;
use crate::exec::TaskExecutor;
use crate::fs::FileSystem;
use crate::task::{TaskEnv, TaskRegistry};
use crate::types::TaskName;

/// Options for a single `build` invocation.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Task name patterns (full-match regexes); empty selects every task.
    pub patterns: Vec<String>,
    /// Overrides `[config].jobs` when set.
    pub jobs: Option<usize>,
}

/// Which output directories `clean` removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanTarget {
    All,
    /// The named tasks and all of their transitive dependencies.
    Tasks(Vec<TaskName>),
}

/// Result of rebuild determination, before anything runs.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    /// Selected tasks and their dependencies.
    pub selected: DependencyGraph,
    /// The part of `selected` that must run.
    pub rebuild: DependencyGraph,
}

impl BuildPlan {
    pub fn skipped(&self) -> usize {
        self.selected.len() - self.rebuild.len()
    }
}

/// Outcome of `build`: the executor result plus how many tasks were up to
/// date.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub result: BuildResult,
    pub skipped: usize,
}

impl BuildReport {
    pub fn success(&self) -> bool {
        self.result.success
    }
}

/// A loaded project: configuration, resolved tasks and dependency graph.
#[derive(Debug)]
pub struct Project {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    config: ProjectConfig,
    registry: Arc<TaskRegistry>,
    graph: DependencyGraph,
}

impl Project {
    /// Load `config_path`, build the dependency graph and discover task
    /// definitions below the project root.
    ///
    /// Fails before touching any state if the configuration is invalid or
    /// the dependency graph has a cycle.
    pub fn load(fs: Arc<dyn FileSystem>, config_path: &Path) -> Result<Self> {
        let config = load_and_validate(fs.as_ref(), config_path)?;
        let root = project_root(config_path);
        let graph = build_dependency_graph(Some(&config.dependency_map()))?;

        let skip = [
            root.join(&config.config.build_dir),
            root.join(&config.config.state_dir),
        ];
        let discovered =
            discover_task_definitions(fs.as_ref(), &root, &config.config.task_file, &skip)?;
        let registry = TaskRegistry::from_discovered(
            fs.as_ref(),
            &root,
            &config,
            discovered,
            &TaskEnv::from_process(),
        )?;

        info!(root = ?root, tasks = graph.len(), "loaded project");
        Ok(Self {
            fs,
            root,
            config,
            registry: Arc::new(registry),
            graph,
        })
    }

    /// Assemble a project from already-resolved parts.
    pub fn from_parts(
        fs: Arc<dyn FileSystem>,
        root: PathBuf,
        config: ProjectConfig,
        registry: TaskRegistry,
    ) -> Result<Self> {
        let graph = build_dependency_graph(Some(&config.dependency_map()))?;
        Ok(Self {
            fs,
            root,
            config,
            registry: Arc::new(registry),
            graph,
        })
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn checksum_store(&self) -> ChecksumStore {
        ChecksumStore::new(
            Arc::clone(&self.fs),
            &self.root.join(&self.config.config.state_dir),
            self.config.task_names(),
        )
    }

    fn plan_with(
        &self,
        patterns: &[String],
        checksums: &Checksums,
    ) -> Result<BuildPlan> {
        let selected = select_tasks(&self.graph, patterns)?;
        let staleness = ChecksumStaleness::new(Arc::clone(&self.fs), &self.registry, checksums);
        let rebuild = filter_rebuild_set(&selected, &staleness)?;
        Ok(BuildPlan { selected, rebuild })
    }

    /// Compute what a build would run, without creating or modifying the
    /// checksum store.
    pub fn plan(&self, patterns: &[String]) -> Result<BuildPlan> {
        let checksums = self.checksum_store().snapshot();
        self.plan_with(patterns, &checksums)
    }

    /// Run an incremental build.
    pub async fn build(
        &self,
        backend: Arc<dyn TaskExecutor>,
        options: &BuildOptions,
    ) -> Result<BuildReport> {
        let mut store = self.checksum_store();
        let checksums = store.ensure(&self.config.task_names())?;
        let plan = self.plan_with(&options.patterns, &checksums)?;
        let skipped = plan.skipped();

        if plan.rebuild.is_empty() {
            info!(skipped, "all selected tasks are up to date");
        } else {
            self.registry
                .setup_build_dirs(self.fs.as_ref(), plan.rebuild.tasks())?;
        }

        let state = schedule(&plan.rebuild);
        let executor = Executor::new(
            Arc::clone(&self.registry),
            Arc::new(Mutex::new(store)),
            backend,
            Arc::clone(&self.fs),
            options.jobs.unwrap_or(self.config.config.jobs),
        );
        let result = executor.run(&plan.rebuild, state).await;

        match result.failure.as_ref() {
            None => info!(
                "built {} task(s), skipped {}",
                result.rebuilt_count(),
                skipped
            ),
            Some(failure) => {
                let log = failure
                    .log_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<no log>".to_string());
                error!("build failed at task '{}'; see {}", failure.task, log);
            }
        }

        Ok(BuildReport { result, skipped })
    }

    /// Remove task output directories and mark the affected tasks dirty.
    ///
    /// Returns the number of directories removed.
    pub fn clean(&self, target: &CleanTarget) -> Result<usize> {
        let names: Vec<TaskName> = match target {
            CleanTarget::All => self.registry.names(),
            CleanTarget::Tasks(requested) => {
                for name in requested {
                    if !self.graph.contains(name) {
                        warn!(task = %name, "unknown task; ignoring");
                    }
                }
                self.graph
                    .with_transitive_dependencies(requested.iter().map(String::as_str))
                    .into_iter()
                    .collect()
            }
        };

        let removed = self.registry.clean(self.fs.as_ref(), &names)?;

        let mut store = self.checksum_store();
        if store.exists() && !names.is_empty() {
            store.mark_all_dirty(&names)?;
        }

        info!(removed, "cleaned build directories");
        Ok(removed)
    }
}
