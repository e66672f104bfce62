// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `bob`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "bob",
    version,
    about = "Incremental, parallel builds for C, C++ and Verilator projects.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the project file (TOML).
    ///
    /// Default: `bob.toml` in the current working directory.
    #[arg(long, global = true, value_name = "PATH", default_value = "bob.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BOB_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Shorthand for `--log-level debug`.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Rebuild stale tasks and everything depending on them.
    Build(BuildArgs),
    /// Remove task build directories.
    Clean(CleanArgs),
}

/// The literal `all` argument.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Scope {
    All,
}

#[derive(Debug, Clone, Args)]
#[command(group(ArgGroup::new("selection").required(true).args(["scope", "task"])))]
pub struct BuildArgs {
    /// Build every task.
    #[arg(value_enum)]
    pub scope: Option<Scope>,

    /// Build tasks whose name fully matches this regex, plus their
    /// dependencies. May be repeated.
    #[arg(short, long, value_name = "PATTERN")]
    pub task: Vec<String>,

    /// Maximum concurrent tasks (0 = one per CPU). Overrides `[config].jobs`.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Print the rebuild set as a tree without running anything.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Args)]
#[command(group(ArgGroup::new("selection").required(true).args(["scope", "up_to"])))]
pub struct CleanArgs {
    /// Clean every task.
    #[arg(value_enum)]
    pub scope: Option<Scope>,

    /// Clean this task and all of its dependencies. May be repeated.
    #[arg(short = 'u', long = "up-to", value_name = "TASK")]
    pub up_to: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl CliArgs {
    /// Level requested on the command line, `--log-level` taking precedence
    /// over `--verbose`.
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        match (self.log_level, self.verbose) {
            (Some(level), _) => Some(level),
            (None, true) => Some(LogLevel::Debug),
            (None, false) => None,
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
