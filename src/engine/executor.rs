// src/engine/executor.rs

//! Bounded worker pool running a rebuild set in dependency order.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cache::{compute_task_hash, ChecksumStore};
use crate::dag::{DependencyGraph, ScheduleState};
use crate::exec::TaskExecutor;
use crate::fs::FileSystem;
use crate::task::TaskRegistry;
use crate::types::{TaskName, TaskOutcome};

/// Per-task state within one executor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting on unfinished dependencies.
    Pending,
    /// All dependencies succeeded; queued for a worker.
    Ready,
    Running,
    Succeeded,
    Failed,
    /// Never started, or terminated, because the build was cancelled.
    Aborted,
}

/// The first task failure of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub task: TaskName,
    pub log_path: Option<PathBuf>,
    /// Exit code of the failing command, if it got that far.
    pub exit_code: Option<i32>,
}

/// Outcome of one executor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub success: bool,
    /// Tasks that completed successfully, in completion order.
    pub rebuilt: Vec<TaskName>,
    pub failure: Option<BuildFailure>,
    pub states: BTreeMap<TaskName, TaskState>,
}

impl BuildResult {
    pub fn rebuilt_count(&self) -> usize {
        self.rebuilt.len()
    }

    pub fn state_of(&self, task: &str) -> Option<TaskState> {
        self.states.get(task).copied()
    }
}

#[derive(Debug)]
struct SharedSchedule {
    indegree: HashMap<TaskName, usize>,
    ready: VecDeque<TaskName>,
    states: BTreeMap<TaskName, TaskState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerOutcome {
    Succeeded,
    Failed { exit_code: Option<i32> },
    Aborted,
}

#[derive(Debug)]
struct WorkerReport {
    task: TaskName,
    outcome: WorkerOutcome,
}

#[derive(Clone)]
struct WorkerContext {
    registry: Arc<TaskRegistry>,
    store: Arc<Mutex<ChecksumStore>>,
    backend: Arc<dyn TaskExecutor>,
    fs: Arc<dyn FileSystem>,
    graph: Arc<DependencyGraph>,
    schedule: Arc<Mutex<SharedSchedule>>,
    cancelled: Arc<AtomicBool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs tasks on at most `jobs` concurrent workers, failing fast.
///
/// On the first task failure no further tasks are dispatched and every
/// in-flight worker is aborted; dropping a worker kills its subprocess.
pub struct Executor {
    registry: Arc<TaskRegistry>,
    store: Arc<Mutex<ChecksumStore>>,
    backend: Arc<dyn TaskExecutor>,
    fs: Arc<dyn FileSystem>,
    jobs: usize,
}

impl Executor {
    /// `jobs == 0` means one worker per available CPU.
    pub fn new(
        registry: Arc<TaskRegistry>,
        store: Arc<Mutex<ChecksumStore>>,
        backend: Arc<dyn TaskExecutor>,
        fs: Arc<dyn FileSystem>,
        jobs: usize,
    ) -> Self {
        Self {
            registry,
            store,
            backend,
            fs,
            jobs,
        }
    }

    fn worker_count(&self, tasks: usize) -> usize {
        let limit = if self.jobs > 0 {
            self.jobs
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        };
        limit.min(tasks).max(1)
    }

    /// Execute every task of `graph`, starting from `initial`.
    pub async fn run(&self, graph: &DependencyGraph, initial: ScheduleState) -> BuildResult {
        let total = graph.len();
        let mut states: BTreeMap<TaskName, TaskState> = graph
            .tasks()
            .map(|t| (t.to_string(), TaskState::Pending))
            .collect();
        for task in initial.ready.iter() {
            states.insert(task.clone(), TaskState::Ready);
        }

        if total == 0 {
            return BuildResult {
                success: true,
                rebuilt: Vec::new(),
                failure: None,
                states,
            };
        }

        let workers = self.worker_count(total);
        info!(tasks = total, workers, "starting build");

        let schedule = Arc::new(Mutex::new(SharedSchedule {
            indegree: initial.indegree,
            ready: initial.ready,
            states,
        }));
        let cancelled = Arc::new(AtomicBool::new(false));
        let ctx = WorkerContext {
            registry: Arc::clone(&self.registry),
            store: Arc::clone(&self.store),
            backend: Arc::clone(&self.backend),
            fs: Arc::clone(&self.fs),
            graph: Arc::new(graph.clone()),
            schedule: Arc::clone(&schedule),
            cancelled: Arc::clone(&cancelled),
        };

        let mut join_set: JoinSet<WorkerReport> = JoinSet::new();
        let mut running: HashMap<tokio::task::Id, TaskName> = HashMap::new();
        let mut rebuilt: Vec<TaskName> = Vec::new();
        let mut failure: Option<BuildFailure> = None;

        loop {
            while failure.is_none() && join_set.len() < workers {
                let next = {
                    let mut sched = lock(&schedule);
                    let next = sched.ready.pop_front();
                    if let Some(name) = next.as_ref() {
                        sched.states.insert(name.clone(), TaskState::Running);
                    }
                    next
                };
                let Some(name) = next else {
                    break;
                };
                debug!(task = %name, "dispatching task");
                let handle = join_set.spawn(run_worker(ctx.clone(), name.clone()));
                running.insert(handle.id(), name);
            }

            let Some(joined) = join_set.join_next_with_id().await else {
                break;
            };

            let (name, outcome) = match joined {
                Ok((id, report)) => {
                    running.remove(&id);
                    (report.task, report.outcome)
                }
                Err(join_err) => {
                    let name = running.remove(&join_err.id()).unwrap_or_default();
                    if join_err.is_cancelled() {
                        debug!(task = %name, "worker aborted");
                        (name, WorkerOutcome::Aborted)
                    } else {
                        error!(task = %name, error = %join_err, "worker panicked");
                        cancelled.store(true, Ordering::SeqCst);
                        (name, WorkerOutcome::Failed { exit_code: None })
                    }
                }
            };

            match outcome {
                WorkerOutcome::Succeeded => {
                    info!(task = %name, "task completed");
                    rebuilt.push(name);
                }
                WorkerOutcome::Failed { exit_code } => {
                    lock(&schedule).states.insert(name.clone(), TaskState::Failed);
                    if failure.is_none() {
                        let log_path = self.registry.get(&name).map(|t| t.log_path());
                        error!(task = %name, log = ?log_path, "task failed; cancelling build");
                        cancelled.store(true, Ordering::SeqCst);
                        join_set.abort_all();
                        failure = Some(BuildFailure {
                            task: name,
                            log_path,
                            exit_code,
                        });
                    }
                }
                WorkerOutcome::Aborted => {
                    lock(&schedule).states.insert(name, TaskState::Aborted);
                }
            }
        }

        let mut states = std::mem::take(&mut lock(&schedule).states);
        if failure.is_some() {
            for state in states.values_mut() {
                if matches!(
                    state,
                    TaskState::Pending | TaskState::Ready | TaskState::Running
                ) {
                    *state = TaskState::Aborted;
                }
            }
        }

        let success = failure.is_none() && rebuilt.len() == total;
        if !success && failure.is_none() {
            warn!(
                rebuilt = rebuilt.len(),
                tasks = total,
                "build stopped with unfinished tasks"
            );
        }

        BuildResult {
            success,
            rebuilt,
            failure,
            states,
        }
    }
}

async fn run_worker(ctx: WorkerContext, name: TaskName) -> WorkerReport {
    let outcome = run_worker_inner(&ctx, &name).await;
    WorkerReport {
        task: name,
        outcome,
    }
}

async fn run_worker_inner(ctx: &WorkerContext, name: &str) -> WorkerOutcome {
    if ctx.cancelled.load(Ordering::SeqCst) {
        return WorkerOutcome::Aborted;
    }

    let Some(task) = ctx.registry.get(name) else {
        error!(task = %name, "task is not registered");
        ctx.cancelled.store(true, Ordering::SeqCst);
        return WorkerOutcome::Failed { exit_code: None };
    };

    // Left dirty if the run is interrupted.
    if let Err(err) = lock(&ctx.store).mark_dirty(name) {
        warn!(task = %name, error = %err, "failed to mark task dirty");
    }

    if ctx.cancelled.load(Ordering::SeqCst) {
        return WorkerOutcome::Aborted;
    }

    info!(task = %name, task_type = %task.kind.task_type(), "running task");
    match ctx.backend.execute(task).await {
        Ok(TaskOutcome::Success) => {}
        Ok(TaskOutcome::Failed(code)) => {
            ctx.cancelled.store(true, Ordering::SeqCst);
            return WorkerOutcome::Failed {
                exit_code: Some(code),
            };
        }
        Err(err) => {
            error!(task = %name, error = %err, "task could not be executed");
            ctx.cancelled.store(true, Ordering::SeqCst);
            return WorkerOutcome::Failed { exit_code: None };
        }
    }

    // Another task failed while this one ran; its entry stays dirty.
    if ctx.cancelled.load(Ordering::SeqCst) {
        return WorkerOutcome::Aborted;
    }

    let hash = match compute_task_hash(ctx.fs.as_ref(), &task.input_files, &task.definition_file) {
        Ok(hash) => Some(hash),
        Err(err) => {
            warn!(task = %name, error = %err, "failed to hash inputs; leaving task dirty");
            None
        }
    };

    let mut store = lock(&ctx.store);
    if let Some(hash) = hash {
        if let Err(err) = store.mark_clean(name, &hash) {
            warn!(task = %name, error = %err, "failed to mark task clean");
        }
    }

    let mut guard = lock(&ctx.schedule);
    let sched = &mut *guard;
    sched.states.insert(name.to_string(), TaskState::Succeeded);
    for dependent in ctx.graph.dependents_of(name) {
        let Some(degree) = sched.indegree.get_mut(dependent) else {
            continue;
        };
        *degree = degree.saturating_sub(1);
        if *degree == 0 {
            sched.ready.push_back(dependent.clone());
            sched.states.insert(dependent.clone(), TaskState::Ready);
            debug!(task = %dependent, "task ready");
        }
    }
    drop(guard);
    drop(store);

    WorkerOutcome::Succeeded
}
