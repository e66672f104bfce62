// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::errors::{BobError, Result};
use crate::types::TaskName;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct DagNode {
    /// Direct dependencies: tasks that must succeed before this one can run.
    deps: Vec<TaskName>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<TaskName>,
}

/// Task dependency DAG keyed by task name.
///
/// Edges point from a dependency to its dependent. A `DependencyGraph` is
/// only handed out by [`build_dependency_graph`] (which rejects cycles) or
/// derived from an existing graph via [`DependencyGraph::induced_subgraph`],
/// so every value of this type is acyclic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    nodes: BTreeMap<TaskName, DagNode>,
}

/// Build the dependency graph from the `task -> [dependencies]` declarations.
///
/// `None` means the dependency section itself is missing. Every referenced
/// dependency must be a declared task. If the declarations contain a cycle
/// (including a task depending on itself) no graph is returned.
pub fn build_dependency_graph(
    decls: Option<&BTreeMap<TaskName, Vec<TaskName>>>,
) -> Result<DependencyGraph> {
    let decls = decls.ok_or_else(|| {
        BobError::ConfigError("missing dependency section ([tasks] table)".to_string())
    })?;

    let mut nodes: BTreeMap<TaskName, DagNode> = BTreeMap::new();

    // First pass: one node per declared task, deduplicated dependency lists.
    for (name, deps) in decls.iter() {
        let mut seen = BTreeSet::new();
        let mut unique = Vec::with_capacity(deps.len());
        for dep in deps {
            if !decls.contains_key(dep) {
                return Err(BobError::ConfigError(format!(
                    "task '{}' depends on unknown task '{}'",
                    name, dep
                )));
            }
            if seen.insert(dep.as_str()) {
                unique.push(dep.clone());
            }
        }
        nodes.insert(
            name.clone(),
            DagNode {
                deps: unique,
                dependents: Vec::new(),
            },
        );
    }

    // Second pass: populate dependents based on deps.
    for (name, deps) in decls.iter() {
        let mut seen = BTreeSet::new();
        for dep in deps {
            if !seen.insert(dep.as_str()) {
                continue;
            }
            if let Some(dep_node) = nodes.get_mut(dep) {
                dep_node.dependents.push(name.clone());
            }
        }
    }

    let graph = DependencyGraph { nodes };
    graph.check_acyclic()?;

    debug!(
        tasks = graph.len(),
        edges = graph.edges().len(),
        "built dependency graph"
    );
    Ok(graph)
}

impl DependencyGraph {
    fn petgraph(&self) -> DiGraphMap<&str, ()> {
        // Edge direction: dep -> task
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in self.nodes.keys() {
            graph.add_node(name.as_str());
        }
        for (name, node) in self.nodes.iter() {
            for dep in node.deps.iter() {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }
        graph
    }

    fn check_acyclic(&self) -> Result<()> {
        // A topological sort will fail if there is a cycle.
        match toposort(&self.petgraph(), None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(BobError::DagCycle(format!(
                "cycle detected in task DAG involving task '{}'",
                cycle.node_id()
            ))),
        }
    }

    /// All task names, in sorted order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    pub fn in_degree(&self, name: &str) -> usize {
        self.dependencies_of(name).len()
    }

    /// All edges as `(dependency, dependent)` pairs, sorted.
    pub fn edges(&self) -> Vec<(TaskName, TaskName)> {
        let mut edges: Vec<(TaskName, TaskName)> = self
            .nodes
            .iter()
            .flat_map(|(name, node)| node.deps.iter().map(move |dep| (dep.clone(), name.clone())))
            .collect();
        edges.sort();
        edges
    }

    /// Sub-graph with exactly the nodes in `keep` (ignoring unknown names)
    /// and exactly the edges whose endpoints are both kept.
    pub fn induced_subgraph(&self, keep: &BTreeSet<TaskName>) -> DependencyGraph {
        let nodes = self
            .nodes
            .iter()
            .filter(|(name, _)| keep.contains(*name))
            .map(|(name, node)| {
                let retain = |list: &[TaskName]| -> Vec<TaskName> {
                    list.iter().filter(|t| keep.contains(*t)).cloned().collect()
                };
                (
                    name.clone(),
                    DagNode {
                        deps: retain(&node.deps),
                        dependents: retain(&node.dependents),
                    },
                )
            })
            .collect();
        DependencyGraph { nodes }
    }

    /// Every task reachable from `roots` by following dependency edges,
    /// including the roots themselves. Unknown root names are ignored.
    pub fn with_transitive_dependencies<'a, I>(&self, roots: I) -> BTreeSet<TaskName>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut stack: Vec<&str> = roots.into_iter().filter(|r| self.contains(r)).collect();
        let mut visited: BTreeSet<TaskName> = BTreeSet::new();

        while let Some(current) = stack.pop() {
            if !visited.insert(current.to_string()) {
                continue;
            }
            for dep in self.dependencies_of(current) {
                stack.push(dep.as_str());
            }
        }

        visited
    }

    /// Tasks with no dependencies, sorted.
    pub fn roots(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.deps.is_empty())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// A topological order (dependencies before dependents).
    pub fn topological_order(&self) -> Result<Vec<TaskName>> {
        let graph = self.petgraph();
        toposort(&graph, None)
            .map(|order| order.into_iter().map(str::to_string).collect())
            .map_err(|cycle| {
                BobError::DagCycle(format!(
                    "cycle detected in task DAG involving task '{}'",
                    cycle.node_id()
                ))
            })
    }
}
