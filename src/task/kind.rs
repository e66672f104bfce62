// src/task/kind.rs

use std::path::{Path, PathBuf};

use crate::config::model::TaskDefinition;
use crate::task::env::TaskEnv;
use crate::types::TaskType;

/// Makefile used by `verilator_tb_compile` tasks that do not name one,
/// relative to the project root.
pub const DEFAULT_VERILATOR_MAKEFILE: &str = "build_scripts/verilator.mk";

/// Inputs of a C or C++ compile task beyond its sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileSpec {
    pub include_dirs: Vec<PathBuf>,
    pub external_objects: Vec<PathBuf>,
    /// Link into `<output_dir>/<executable_name>` when set; otherwise only
    /// object files are produced.
    pub executable_name: Option<String>,
}

/// What a task does, resolved once when the task is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    CCompile(CompileSpec),
    CppCompile(CompileSpec),
    VerilatorVerilate { top_module: Option<String> },
    VerilatorTbCompile { makefile: PathBuf },
    /// Unknown `task_type`; running it fails the task.
    Unsupported { task_type: String },
}

fn under_root(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

impl TaskKind {
    pub fn from_definition(def: &TaskDefinition, project_root: &Path) -> Self {
        let compile_spec = || CompileSpec {
            include_dirs: def
                .include_dirs
                .iter()
                .map(|p| under_root(project_root, p))
                .collect(),
            external_objects: def
                .external_objects
                .iter()
                .map(|p| under_root(project_root, p))
                .collect(),
            executable_name: def.executable_name.clone(),
        };

        match &def.task_type {
            TaskType::CCompile => TaskKind::CCompile(compile_spec()),
            TaskType::CppCompile => TaskKind::CppCompile(compile_spec()),
            TaskType::VerilatorVerilate => TaskKind::VerilatorVerilate {
                top_module: def.top_module.clone(),
            },
            TaskType::VerilatorTbCompile => TaskKind::VerilatorTbCompile {
                makefile: under_root(
                    project_root,
                    def.makefile
                        .as_deref()
                        .unwrap_or_else(|| Path::new(DEFAULT_VERILATOR_MAKEFILE)),
                ),
            },
            TaskType::Unsupported(other) => TaskKind::Unsupported {
                task_type: other.clone(),
            },
        }
    }

    /// The `task_type` tag this kind was resolved from.
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskKind::CCompile(_) => TaskType::CCompile,
            TaskKind::CppCompile(_) => TaskType::CppCompile,
            TaskKind::VerilatorVerilate { .. } => TaskType::VerilatorVerilate,
            TaskKind::VerilatorTbCompile { .. } => TaskType::VerilatorTbCompile,
            TaskKind::Unsupported { task_type } => TaskType::Unsupported(task_type.clone()),
        }
    }

    /// Files besides the sources whose content affects the task's output.
    pub fn extra_inputs(&self) -> Vec<PathBuf> {
        match self {
            TaskKind::CCompile(spec) | TaskKind::CppCompile(spec) => {
                spec.external_objects.clone()
            }
            TaskKind::VerilatorTbCompile { makefile } => vec![makefile.clone()],
            TaskKind::VerilatorVerilate { .. } | TaskKind::Unsupported { .. } => Vec::new(),
        }
    }

    /// Export the kind-specific variables into `env`.
    pub fn export_env(&self, env: &mut TaskEnv, sources: &[PathBuf], output_dir: &Path) {
        let lossy = |paths: &[PathBuf]| -> Vec<String> {
            paths.iter().map(|p| p.to_string_lossy().into_owned()).collect()
        };

        match self {
            TaskKind::CCompile(spec) | TaskKind::CppCompile(spec) => {
                let prefix = if matches!(self, TaskKind::CCompile(_)) {
                    "C_COMPILE"
                } else {
                    "CPP_COMPILE"
                };
                env.update(&format!("{prefix}_SRC_FILES"), lossy(sources), true);
                if let Some(exe) = spec.executable_name.as_deref() {
                    env.update(&format!("{prefix}_EXECUTABLE_NAME"), [exe], true);
                    let exe_path = output_dir.join(exe);
                    env.update(
                        &format!("{prefix}_EXECUTABLE_PATH"),
                        [exe_path.to_string_lossy()],
                        true,
                    );
                }
                env.update(
                    &format!("{prefix}_EXTERNAL_OBJECT_PATHS"),
                    lossy(&spec.external_objects),
                    true,
                );
                env.update(
                    &format!("{prefix}_INCLUDE_HEADER_DIRS"),
                    lossy(&spec.include_dirs),
                    true,
                );
            }
            TaskKind::VerilatorVerilate { top_module } => {
                env.update("VERILATOR_VERILATE_SRC_FILES", lossy(sources), true);
                if let Some(top) = top_module.as_deref() {
                    env.update("VERILATOR_VERILATE_TOP_MODULE", [top], true);
                }
            }
            TaskKind::VerilatorTbCompile { .. } | TaskKind::Unsupported { .. } => {}
        }
    }
}
