use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Outcome reported by a [`crate::exec::TaskExecutor`] for a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// Non-zero exit code of the failing subprocess, or `-1` if the task
    /// failed before or without a process exit status.
    Failed(i32),
}

impl TaskOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

/// Tag of a task's type as written in a task definition file.
///
/// Unknown strings are kept (as `Unsupported`) instead of being rejected at
/// load time; running such a task is an execution failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum TaskType {
    CCompile,
    CppCompile,
    VerilatorVerilate,
    VerilatorTbCompile,
    Unsupported(String),
}

impl From<String> for TaskType {
    fn from(s: String) -> Self {
        match s.trim() {
            "c_compile" => TaskType::CCompile,
            "cpp_compile" => TaskType::CppCompile,
            "verilator_verilate" => TaskType::VerilatorVerilate,
            "verilator_tb_compile" => TaskType::VerilatorTbCompile,
            _ => TaskType::Unsupported(s),
        }
    }
}

impl FromStr for TaskType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TaskType::from(s.to_string()))
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::CCompile => f.write_str("c_compile"),
            TaskType::CppCompile => f.write_str("cpp_compile"),
            TaskType::VerilatorVerilate => f.write_str("verilator_verilate"),
            TaskType::VerilatorTbCompile => f.write_str("verilator_tb_compile"),
            TaskType::Unsupported(other) => f.write_str(other),
        }
    }
}
