// src/config/validate.rs

use std::collections::{BTreeMap, BTreeSet};

use crate::config::model::{DiscoveredTask, ProjectConfig, RawProjectConfig};
use crate::errors::{BobError, Result};

impl TryFrom<RawProjectConfig> for ProjectConfig {
    type Error = crate::errors::BobError;

    fn try_from(raw: RawProjectConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let tasks = raw.tasks.unwrap_or_default();
        Ok(ProjectConfig::new_unchecked(raw.config, raw.tools, tasks))
    }
}

fn validate_raw_config(cfg: &RawProjectConfig) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_task_dependencies(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawProjectConfig) -> Result<()> {
    match cfg.tasks.as_ref() {
        None => Err(BobError::ConfigError(
            "config is missing the dependency section ([tasks.<name>] tables)".to_string(),
        )),
        Some(tasks) if tasks.is_empty() => Err(BobError::ConfigError(
            "config must declare at least one [tasks.<name>] section".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

fn validate_global_config(cfg: &RawProjectConfig) -> Result<()> {
    let section = &cfg.config;

    if section.state_dir.as_os_str().is_empty() {
        return Err(BobError::ConfigError(
            "[config].state_dir must not be empty".to_string(),
        ));
    }
    if section.build_dir.as_os_str().is_empty() {
        return Err(BobError::ConfigError(
            "[config].build_dir must not be empty".to_string(),
        ));
    }
    if section.state_dir == section.build_dir {
        return Err(BobError::ConfigError(format!(
            "[config].state_dir and [config].build_dir must differ (both {:?})",
            section.state_dir
        )));
    }
    if section.task_file.trim().is_empty() {
        return Err(BobError::ConfigError(
            "[config].task_file must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_task_dependencies(cfg: &RawProjectConfig) -> Result<()> {
    let Some(tasks) = cfg.tasks.as_ref() else {
        return Ok(());
    };
    for (name, decl) in tasks.iter() {
        if name.trim().is_empty() {
            return Err(BobError::ConfigError(
                "task names must not be empty".to_string(),
            ));
        }
        for dep in decl.depends_on.iter() {
            if !tasks.contains_key(dep) {
                return Err(BobError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `depends_on`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

/// Cross-check declared tasks against discovered definition files.
///
/// Every `[tasks.<name>]` entry needs exactly one definition file and every
/// definition file must be declared.
pub fn validate_discovered(
    cfg: &ProjectConfig,
    discovered: &[DiscoveredTask],
) -> Result<()> {
    let mut seen: BTreeMap<&str, &DiscoveredTask> = BTreeMap::new();
    for task in discovered {
        let name = task.definition.task_name.as_str();
        if let Some(previous) = seen.insert(name, task) {
            return Err(BobError::ConfigError(format!(
                "duplicate task name '{}' in {:?} and {:?}",
                name, previous.definition_file, task.definition_file
            )));
        }
    }

    let declared: BTreeSet<&str> = cfg.tasks.keys().map(String::as_str).collect();
    let defined: BTreeSet<&str> = seen.keys().copied().collect();

    if let Some(missing) = declared.difference(&defined).next() {
        return Err(BobError::ConfigError(format!(
            "task '{}' is declared in [tasks] but no {} defines it",
            missing, cfg.config.task_file
        )));
    }
    if let Some(undeclared) = defined.difference(&declared).next() {
        let file = seen
            .get(undeclared)
            .map(|t| t.definition_file.display().to_string())
            .unwrap_or_default();
        return Err(BobError::ConfigError(format!(
            "task '{}' defined in {} is not declared in [tasks]",
            undeclared, file
        )));
    }

    Ok(())
}
