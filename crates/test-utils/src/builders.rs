#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bob::config::{ConfigSection, ProjectConfig, RawProjectConfig, TaskDeclaration};
use bob::engine::Project;
use bob::fs::mock::MockFileSystem;
use bob::task::{CompileSpec, Task, TaskEnv, TaskKind, TaskRegistry};

/// Builder for `ProjectConfig` to simplify test setup.
pub struct ProjectConfigBuilder {
    config: RawProjectConfig,
}

impl ProjectConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawProjectConfig {
                config: ConfigSection::default(),
                tools: BTreeMap::new(),
                tasks: Some(BTreeMap::new()),
            },
        }
    }

    /// Declare `name` with the given direct dependencies.
    pub fn with_task(mut self, name: &str, depends_on: &[&str]) -> Self {
        self.config.tasks.get_or_insert_with(BTreeMap::new).insert(
            name.to_string(),
            TaskDeclaration {
                depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            },
        );
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.config.config.jobs = jobs;
        self
    }

    pub fn with_tool(mut self, name: &str, path: &str) -> Self {
        self.config.tools.insert(name.to_string(), PathBuf::from(path));
        self
    }

    pub fn raw(self) -> RawProjectConfig {
        self.config
    }

    pub fn build(self) -> ProjectConfig {
        ProjectConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ProjectConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a resolved `Task` laid out under `root`:
/// `<root>/<name>/task.toml` and output dir `<root>/build/<name>`.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(name: &str, root: &Path) -> Self {
        let task_dir = root.join(name);
        Self {
            task: Task {
                name: name.to_string(),
                definition_file: task_dir.join("task.toml"),
                task_dir,
                output_dir: root.join("build").join(name),
                sources: Vec::new(),
                input_files: Vec::new(),
                kind: TaskKind::CCompile(CompileSpec::default()),
                env: TaskEnv::new(),
            },
        }
    }

    /// Set the sources; they also become the task's inputs.
    pub fn sources(mut self, sources: &[PathBuf]) -> Self {
        self.task.sources = sources.to_vec();
        self.task.input_files = sources.to_vec();
        self
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.task.input_files.push(path.into());
        self
    }

    pub fn kind(mut self, kind: TaskKind) -> Self {
        self.task.kind = kind;
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.task.env.set(key, value);
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// A default task per declared task in `cfg`, each with its definition file
/// written into `fs`.
pub fn mock_registry(fs: &MockFileSystem, root: &Path, cfg: &ProjectConfig) -> TaskRegistry {
    let tasks: Vec<Task> = cfg
        .tasks
        .keys()
        .map(|name| TaskBuilder::new(name, root).build())
        .collect();
    for task in &tasks {
        fs.add_file(
            &task.definition_file,
            format!("task_name = \"{}\"\ntask_type = \"c_compile\"\n", task.name),
        );
    }
    TaskRegistry::from_tasks(root.join("build"), tasks)
}

/// A project over `fs` whose tasks are the defaults from [`mock_registry`].
pub fn mock_project(fs: &MockFileSystem, root: &Path, cfg: ProjectConfig) -> Project {
    let registry = mock_registry(fs, root, &cfg);
    Project::from_parts(Arc::new(fs.clone()), root.to_path_buf(), cfg, registry)
        .expect("project from builder config")
}
