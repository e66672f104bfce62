// src/exec/command.rs

//! Command lines for each task kind.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::task::{CompileSpec, Task, TaskKind};

/// Tool name to binary path, from the `[tools]` section.
///
/// Tools without an entry resolve to their bare name, looked up on `PATH`
/// when spawned.
#[derive(Debug, Clone, Default)]
pub struct ToolPaths {
    paths: BTreeMap<String, PathBuf>,
}

impl ToolPaths {
    pub fn new(paths: BTreeMap<String, PathBuf>) -> Self {
        Self { paths }
    }

    pub fn resolve(&self, tool: &str) -> PathBuf {
        self.paths
            .get(tool)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(tool))
    }
}

/// A single program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandLine {
    fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
        }
    }

    fn arg(mut self, arg: impl AsRef<Path>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<Path>,
    {
        for a in args {
            self = self.arg(a);
        }
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

fn compile_commands(
    task: &Task,
    spec: &CompileSpec,
    compiler: PathBuf,
    extension: &str,
) -> Vec<CommandLine> {
    let mut commands = Vec::new();
    let mut objects = Vec::new();

    for src in &task.sources {
        if src.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let Some(stem) = src.file_stem() else {
            continue;
        };
        let object = task
            .output_dir
            .join(format!("{}.o", stem.to_string_lossy()));

        let mut cmd = CommandLine::new(compiler.clone())
            .arg("-c")
            .arg(src)
            .arg("-o")
            .arg(&object);
        for dir in &spec.include_dirs {
            cmd = cmd.arg("-I").arg(dir);
        }
        commands.push(cmd);
        objects.push(object);
    }

    if let Some(exe) = spec.executable_name.as_deref() {
        let link = CommandLine::new(compiler)
            .args(&objects)
            .args(&spec.external_objects)
            .arg("-o")
            .arg(task.output_dir.join(exe));
        commands.push(link);
    }

    commands
}

/// Commands that build `task`, in execution order.
///
/// Fails for task kinds that cannot be run.
pub fn build_commands(task: &Task, tools: &ToolPaths) -> Result<Vec<CommandLine>, String> {
    match &task.kind {
        TaskKind::CCompile(spec) => Ok(compile_commands(task, spec, tools.resolve("gcc"), "c")),
        TaskKind::CppCompile(spec) => {
            Ok(compile_commands(task, spec, tools.resolve("g++"), "cpp"))
        }
        TaskKind::VerilatorVerilate { top_module } => {
            let mut cmd = CommandLine::new(tools.resolve("verilator"))
                .arg("--cc")
                .args(&task.sources)
                .arg("--Mdir")
                .arg(&task.output_dir);
            if let Some(top) = top_module.as_deref() {
                cmd = cmd.arg("--top-module").arg(top);
            }
            Ok(vec![cmd])
        }
        TaskKind::VerilatorTbCompile { makefile } => Ok(vec![CommandLine::new(tools.resolve("make"))
            .arg("-C")
            .arg(&task.output_dir)
            .arg("-f")
            .arg(makefile)]),
        TaskKind::Unsupported { task_type } => Err(format!(
            "task '{}' has unsupported task_type '{}'",
            task.name, task_type
        )),
    }
}
