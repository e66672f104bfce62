// src/dag/scheduler.rs

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::dag::graph::DependencyGraph;
use crate::types::TaskName;

/// Initial scheduling state of one executor run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleState {
    /// Unresolved dependencies per task.
    pub indegree: HashMap<TaskName, usize>,
    /// Tasks with no unresolved dependencies, in task-name order.
    pub ready: VecDeque<TaskName>,
}

impl ScheduleState {
    pub fn is_empty(&self) -> bool {
        self.indegree.is_empty()
    }
}

/// Compute the indegree of every task in `graph` and queue the tasks that
/// have none. Nothing is executed.
pub fn schedule(graph: &DependencyGraph) -> ScheduleState {
    let mut state = ScheduleState::default();

    for task in graph.tasks() {
        let degree = graph.in_degree(task);
        state.indegree.insert(task.to_string(), degree);
        if degree == 0 {
            state.ready.push_back(task.to_string());
        }
    }

    debug!(
        tasks = state.indegree.len(),
        ready = state.ready.len(),
        "initial schedule"
    );
    state
}
