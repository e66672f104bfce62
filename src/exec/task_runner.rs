// src/exec/task_runner.rs

//! Subprocess runner writing timestamped output to a task log.

use std::process::Stdio;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::exec::command::CommandLine;
use crate::task::Task;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `YYYY-MM-DD HH:MM:SS` for a wall-clock time.
pub fn format_timestamp(at: &NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn now_timestamp() -> String {
    format_timestamp(&Local::now().naive_local())
}

/// Append one `[timestamp] line` entry to `log`.
pub async fn write_log_line(log: &mut File, line: &str) -> Result<()> {
    let entry = format!("[{}] {}\n", now_timestamp(), line);
    log.write_all(entry.as_bytes())
        .await
        .context("writing task log")?;
    Ok(())
}

/// Run `cmd` for `task` with exactly the task's environment, copying its
/// stdout and stderr line by line into `log`.
///
/// Returns the exit code (`-1` if the process was terminated by a signal).
/// The child is killed if this future is dropped before it exits.
pub async fn run_command(task: &Task, cmd: &CommandLine, log: &mut File) -> Result<i32> {
    info!(task = %task.name, cmd = %cmd, "starting task process");
    write_log_line(log, &format!("$ {cmd}")).await?;

    let mut command = Command::new(&cmd.program);
    command
        .args(&cmd.args)
        .env_clear()
        .envs(task.env.iter())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning '{}' for task '{}'", cmd.program.display(), task.name))?;

    let stdout = child
        .stdout
        .take()
        .context("child stdout was not captured")?;
    let stderr = child
        .stderr
        .take()
        .context("child stderr was not captured")?;
    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();
    let mut stdout_open = true;
    let mut stderr_open = true;

    while stdout_open || stderr_open {
        tokio::select! {
            line = stdout_lines.next_line(), if stdout_open => {
                match line.context("reading child stdout")? {
                    Some(line) => write_log_line(log, &line).await?,
                    None => stdout_open = false,
                }
            }
            line = stderr_lines.next_line(), if stderr_open => {
                match line.context("reading child stderr")? {
                    Some(line) => write_log_line(log, &line).await?,
                    None => stderr_open = false,
                }
            }
        }
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of task '{}'", task.name))?;
    log.flush().await.context("flushing task log")?;

    let code = status.code().unwrap_or(-1);
    debug!(
        task = %task.name,
        exit_code = code,
        success = status.success(),
        "task process exited"
    );
    Ok(if status.success() { 0 } else { code })
}
