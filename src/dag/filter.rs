// src/dag/filter.rs

//! Rebuild-set computation and task selection.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use crate::cache::{compute_task_hash, should_rebuild, Checksums};
use crate::dag::graph::DependencyGraph;
use crate::errors::{BobError, Result};
use crate::fs::FileSystem;
use crate::task::TaskRegistry;
use crate::types::TaskName;

/// Decides whether a single task is stale on its own account, ignoring its
/// dependencies.
pub trait StalenessCheck {
    fn is_stale(&self, task: &str) -> bool;
}

impl<F> StalenessCheck for F
where
    F: Fn(&str) -> bool,
{
    fn is_stale(&self, task: &str) -> bool {
        self(task)
    }
}

/// Staleness from the checksum store: a task is stale when its stored entry
/// is dirty or its hash differs from the hash of its current inputs.
#[derive(Debug)]
pub struct ChecksumStaleness<'a> {
    fs: Arc<dyn FileSystem>,
    registry: &'a TaskRegistry,
    checksums: &'a Checksums,
}

impl<'a> ChecksumStaleness<'a> {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        registry: &'a TaskRegistry,
        checksums: &'a Checksums,
    ) -> Self {
        Self {
            fs,
            registry,
            checksums,
        }
    }
}

impl StalenessCheck for ChecksumStaleness<'_> {
    fn is_stale(&self, task: &str) -> bool {
        let Some(t) = self.registry.get(task) else {
            warn!(task = %task, "no task definition; treating as stale");
            return true;
        };
        let fresh = match compute_task_hash(self.fs.as_ref(), &t.input_files, &t.definition_file) {
            Ok(hash) => hash,
            Err(err) => {
                warn!(task = %task, error = %err, "failed to hash inputs; treating as stale");
                return true;
            }
        };
        let stale = should_rebuild(self.checksums.get(task), &fresh);
        debug!(task = %task, stale, "checked task checksum");
        stale
    }
}

/// Compute the rebuild set of `graph`.
///
/// A task is rebuilt if it is stale itself or if any of its dependencies is
/// rebuilt. The result is the sub-graph induced by the rebuilt tasks.
pub fn filter_rebuild_set(
    graph: &DependencyGraph,
    check: &dyn StalenessCheck,
) -> Result<DependencyGraph> {
    let mut verdicts: HashMap<&str, bool> = HashMap::with_capacity(graph.len());
    let mut visiting: HashSet<&str> = HashSet::new();

    for start in graph.tasks() {
        if verdicts.contains_key(start) {
            continue;
        }

        // (task, dependencies already pushed)
        let mut stack: Vec<(&str, bool)> = vec![(start, false)];

        while let Some((task, expanded)) = stack.pop() {
            if verdicts.contains_key(task) {
                continue;
            }

            if expanded {
                visiting.remove(task);
                let rebuild = graph
                    .dependencies_of(task)
                    .iter()
                    .any(|dep| verdicts.get(dep.as_str()).copied().unwrap_or(false));
                verdicts.insert(task, rebuild);
                continue;
            }

            if !visiting.insert(task) {
                return Err(BobError::DagCycle(format!(
                    "cycle detected in task DAG involving task '{}'",
                    task
                )));
            }

            if check.is_stale(task) {
                visiting.remove(task);
                verdicts.insert(task, true);
                continue;
            }

            stack.push((task, true));
            for dep in graph.dependencies_of(task) {
                let dep = dep.as_str();
                if verdicts.contains_key(dep) {
                    continue;
                }
                if visiting.contains(dep) {
                    return Err(BobError::DagCycle(format!(
                        "cycle detected in task DAG involving task '{}'",
                        dep
                    )));
                }
                stack.push((dep, false));
            }
        }
    }

    let rebuild: BTreeSet<TaskName> = verdicts
        .into_iter()
        .filter(|(_, rebuild)| *rebuild)
        .map(|(task, _)| task.to_string())
        .collect();

    debug!(
        rebuild = rebuild.len(),
        skipped = graph.len() - rebuild.len(),
        "computed rebuild set"
    );
    Ok(graph.induced_subgraph(&rebuild))
}

/// Restrict `graph` to tasks whose name fully matches one of `patterns`,
/// plus all of their transitive dependencies.
///
/// An empty pattern list selects every task. A non-empty list that matches
/// nothing is a configuration error.
pub fn select_tasks(graph: &DependencyGraph, patterns: &[String]) -> Result<DependencyGraph> {
    if patterns.is_empty() {
        return Ok(graph.clone());
    }

    let mut regexes = Vec::with_capacity(patterns.len());
    for pat in patterns {
        let re = Regex::new(&format!("^(?:{pat})$")).map_err(|e| {
            BobError::ConfigError(format!("invalid task pattern '{}': {}", pat, e))
        })?;
        regexes.push(re);
    }

    let matched: Vec<&str> = graph
        .tasks()
        .filter(|name| regexes.iter().any(|re| re.is_match(name)))
        .collect();

    if matched.is_empty() {
        return Err(BobError::ConfigError(format!(
            "no task matches {:?}",
            patterns
        )));
    }
    debug!(?matched, "selected tasks");

    let keep = graph.with_transitive_dependencies(matched);
    Ok(graph.induced_subgraph(&keep))
}
