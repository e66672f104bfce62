// src/dag/visualise.rs

use std::collections::HashSet;
use std::fmt::Write;

use crate::dag::graph::DependencyGraph;

/// Render `graph` as an ASCII tree, one line per task.
///
/// Roots are printed as `* [task]` in name order and dependents are nested
/// depth-first beneath the task they depend on. A task reachable along
/// several paths is printed only under the first one, even when another of
/// its dependencies has not been printed yet.
pub fn render_tree(graph: &DependencyGraph) -> String {
    let mut out = String::new();
    let mut visited: HashSet<&str> = HashSet::new();

    for root in graph.roots() {
        render_node(graph, root, &mut Vec::new(), &mut visited, &mut out);
    }

    out
}

fn render_node<'g>(
    graph: &'g DependencyGraph,
    task: &'g str,
    branches: &mut Vec<bool>,
    visited: &mut HashSet<&'g str>,
    out: &mut String,
) {
    if !visited.insert(task) {
        return;
    }

    let mut prefix = String::new();
    if let Some((_, parents)) = branches.split_last() {
        for more_siblings in parents {
            prefix.push_str(if *more_siblings { "│   " } else { "    " });
        }
        prefix.push_str("├── ");
    } else {
        prefix.push_str("* ");
    }
    let _ = writeln!(out, "{prefix}[{task}]");

    let children = graph.dependents_of(task);
    for (i, child) in children.iter().enumerate() {
        branches.push(i + 1 < children.len());
        render_node(graph, child, branches, visited, out);
        branches.pop();
    }
}
