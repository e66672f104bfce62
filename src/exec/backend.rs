// src/exec/backend.rs

//! Pluggable task executor abstraction.
//!
//! The engine talks to a `TaskExecutor` instead of spawning processes
//! itself, so tests can swap in a fake that scripts outcomes and delays.

use std::future::Future;
use std::pin::Pin;

use anyhow::Context;
use tokio::fs::{self, File};
use tracing::{error, info};

use crate::errors::Result;
use crate::exec::command::{build_commands, ToolPaths};
use crate::exec::task_runner::{run_command, write_log_line};
use crate::task::{Task, TaskKind};
use crate::types::TaskOutcome;

/// Runs a single task to completion.
///
/// `Ok(TaskOutcome::Failed(_))` and `Err(_)` both fail the build; an `Err`
/// means the task could not be run at all.
pub trait TaskExecutor: Send + Sync {
    fn execute<'a>(
        &'a self,
        task: &'a Task,
    ) -> Pin<Box<dyn Future<Output = Result<TaskOutcome>> + Send + 'a>>;
}

/// Executor that runs each task's tool commands as local subprocesses.
///
/// Output goes to `<output_dir>/<task>.log`, truncated at the start of
/// every run.
#[derive(Debug, Clone, Default)]
pub struct ProcessTaskExecutor {
    tools: ToolPaths,
}

impl ProcessTaskExecutor {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }

    async fn run(&self, task: &Task) -> Result<TaskOutcome> {
        fs::create_dir_all(&task.output_dir)
            .await
            .with_context(|| format!("creating output dir {:?}", task.output_dir))?;
        let log_path = task.log_path();
        let mut log = File::create(&log_path)
            .await
            .with_context(|| format!("creating task log {:?}", log_path))?;

        let missing: Vec<_> = task.sources.iter().filter(|p| !p.is_file()).collect();
        if !missing.is_empty() {
            for path in &missing {
                write_log_line(&mut log, &format!("missing source file: {}", path.display()))
                    .await?;
            }
            error!(task = %task.name, missing = ?missing, "source files missing");
            return Ok(TaskOutcome::Failed(-1));
        }

        if let TaskKind::VerilatorTbCompile { makefile } = &task.kind {
            if !makefile.is_file() {
                write_log_line(&mut log, &format!("missing makefile: {}", makefile.display()))
                    .await?;
                error!(task = %task.name, makefile = ?makefile, "makefile missing");
                return Ok(TaskOutcome::Failed(-1));
            }
        }

        let commands = match build_commands(task, &self.tools) {
            Ok(commands) => commands,
            Err(reason) => {
                write_log_line(&mut log, &reason).await?;
                error!(task = %task.name, task_type = %task.kind.task_type(), "{}", reason);
                return Ok(TaskOutcome::Failed(-1));
            }
        };

        for cmd in &commands {
            let code = run_command(task, cmd, &mut log).await?;
            if code != 0 {
                error!(task = %task.name, exit_code = code, log = ?log_path, "command failed");
                return Ok(TaskOutcome::Failed(code));
            }
        }

        info!(task = %task.name, commands = commands.len(), "task succeeded");
        Ok(TaskOutcome::Success)
    }
}

impl TaskExecutor for ProcessTaskExecutor {
    fn execute<'a>(
        &'a self,
        task: &'a Task,
    ) -> Pin<Box<dyn Future<Output = Result<TaskOutcome>> + Send + 'a>> {
        Box::pin(self.run(task))
    }
}
