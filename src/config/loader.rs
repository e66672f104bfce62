// src/config/loader.rs

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::model::{DiscoveredTask, ProjectConfig, RawProjectConfig, TaskDefinition};
use crate::errors::{BobError, Result};
use crate::fs::FileSystem;

/// Load a project file and return the raw `RawProjectConfig`.
///
/// This only performs TOML deserialization. Use [`load_and_validate`] for
/// the structural checks.
pub fn load_from_path(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<RawProjectConfig> {
    let path = path.as_ref();
    let contents = fs.read_to_string(path)?;

    let config: RawProjectConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a project file and validate it.
///
/// Checks for a present, non-empty dependency section, unknown
/// `depends_on` references and `[config]` sanity. Cycles are left to the
/// graph builder.
pub fn load_and_validate(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<ProjectConfig> {
    let raw_config = load_from_path(fs, &path)?;
    let config = ProjectConfig::try_from(raw_config)?;
    Ok(config)
}

/// Directory that relative paths in the project file are resolved against.
pub fn project_root(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn load_definition(fs: &dyn FileSystem, path: &Path) -> Result<TaskDefinition> {
    let contents = fs.read_to_string(path)?;
    toml::from_str(&contents).map_err(|e| {
        BobError::ConfigError(format!("invalid task definition {:?}: {}", path, e))
    })
}

/// Recursively find task definition files named `task_file` under `root`.
///
/// Directories in `skip` and hidden directories are not descended into.
/// Results are sorted by definition file path.
pub fn discover_task_definitions(
    fs: &dyn FileSystem,
    root: &Path,
    task_file: &str,
    skip: &[PathBuf],
) -> Result<Vec<DiscoveredTask>> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs.read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = ?dir, error = %err, "skipping unreadable directory");
                continue;
            }
        };

        for path in entries {
            if fs.is_dir(&path) {
                let hidden = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'));
                if hidden || skip.iter().any(|s| s == &path) {
                    continue;
                }
                stack.push(path);
            } else if path.file_name().and_then(|n| n.to_str()) == Some(task_file) {
                let definition = load_definition(fs, &path)?;
                debug!(task = %definition.task_name, file = ?path, "discovered task");
                found.push(DiscoveredTask {
                    definition,
                    task_dir: dir.clone(),
                    definition_file: path,
                });
            }
        }
    }

    found.sort_by(|a, b| a.definition_file.cmp(&b.definition_file));
    Ok(found)
}
