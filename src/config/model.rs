// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{TaskName, TaskType};

/// Project configuration as read from `bob.toml`, before validation.
///
/// ```toml
/// [config]
/// state_dir = ".bob"
/// build_dir = "build"
/// jobs = 0
///
/// [tools]
/// gcc = "/usr/bin/gcc"
///
/// [tasks.hello_world_2]
/// depends_on = ["hello_world_3", "hello_world_6"]
///
/// [tasks.hello_world_3]
/// depends_on = ["hello_world_4", "hello_world_5"]
/// ```
///
/// The `tasks` table is the dependency section; it has no default so that
/// its absence can be reported instead of silently building nothing.
#[derive(Debug, Clone, Deserialize)]
pub struct RawProjectConfig {
    #[serde(default)]
    pub config: ConfigSection,

    /// Tool name to binary path.
    #[serde(default)]
    pub tools: BTreeMap<String, PathBuf>,

    #[serde(default)]
    pub tasks: Option<BTreeMap<TaskName, TaskDeclaration>>,
}

/// Validated project configuration.
///
/// Only produced through `TryFrom<RawProjectConfig>` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub config: ConfigSection,
    pub tools: BTreeMap<String, PathBuf>,
    pub tasks: BTreeMap<TaskName, TaskDeclaration>,
}

impl ProjectConfig {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        tools: BTreeMap<String, PathBuf>,
        tasks: BTreeMap<TaskName, TaskDeclaration>,
    ) -> Self {
        Self {
            config,
            tools,
            tasks,
        }
    }

    /// `task -> direct dependencies`, the input of the graph builder.
    pub fn dependency_map(&self) -> BTreeMap<TaskName, Vec<TaskName>> {
        self.tasks
            .iter()
            .map(|(name, decl)| (name.clone(), decl.depends_on.clone()))
            .collect()
    }

    pub fn task_names(&self) -> Vec<TaskName> {
        self.tasks.keys().cloned().collect()
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Directory (relative to the project root) holding `checksum.json`.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Directory (relative to the project root) holding one output
    /// directory per task.
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Maximum number of concurrently running tasks; `0` means one per
    /// available CPU.
    #[serde(default)]
    pub jobs: usize,

    /// File name of task definition files searched for during discovery.
    #[serde(default = "default_task_file")]
    pub task_file: String,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".bob")
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_task_file() -> String {
    "task.toml".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            build_dir: default_build_dir(),
            jobs: 0,
            task_file: default_task_file(),
        }
    }
}

/// `[tasks.<name>]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskDeclaration {
    #[serde(default)]
    pub depends_on: Vec<TaskName>,
}

/// A value in a task's `[env]` table: a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    One(String),
    Many(Vec<String>),
}

impl EnvValue {
    pub fn values(&self) -> Vec<String> {
        match self {
            EnvValue::One(s) => vec![s.clone()],
            EnvValue::Many(v) => v.clone(),
        }
    }
}

/// Contents of a task definition file (`task.toml`).
///
/// ```toml
/// task_name = "hello_world_4"
/// task_type = "c_compile"
/// sources = ["src/*.c"]
/// include_dirs = ["include"]
/// executable_name = "hello"
///
/// [env]
/// CFLAGS = "-O2"
/// ```
///
/// `sources` are glob patterns relative to the directory of the definition
/// file. `external_sources`, `include_dirs`, `external_objects` and
/// `makefile` are relative to the project root.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskDefinition {
    pub task_name: TaskName,
    pub task_type: TaskType,

    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub external_sources: Vec<String>,

    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,

    #[serde(default)]
    pub external_objects: Vec<PathBuf>,

    #[serde(default)]
    pub executable_name: Option<String>,

    #[serde(default)]
    pub top_module: Option<String>,

    #[serde(default)]
    pub makefile: Option<PathBuf>,

    #[serde(default)]
    pub env: BTreeMap<String, EnvValue>,
}

/// A task definition together with where it was found.
#[derive(Debug, Clone)]
pub struct DiscoveredTask {
    pub definition: TaskDefinition,
    /// Path of the definition file itself (hashed along with the inputs).
    pub definition_file: PathBuf,
    /// Directory containing the definition file.
    pub task_dir: PathBuf,
}
