use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bob::errors::{BobError, Result};
use bob::exec::TaskExecutor;
use bob::task::Task;
use bob::types::{TaskOutcome, TaskName};

/// What the fake does for one task.
#[derive(Debug, Clone, Copy)]
pub enum Script {
    Succeed,
    Fail(i32),
    /// Return an `Err`, as if the task could not be spawned.
    Error,
}

/// Tracks concurrently running fake tasks; decremented on drop so aborted
/// tasks are accounted for too.
struct RunningGuard {
    running: Arc<AtomicUsize>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A fake task executor that:
/// - records which tasks were started and which ran to completion
/// - sleeps for a per-task delay, then reports a scripted outcome
///   (success unless told otherwise)
/// - remembers the peak number of tasks running at once.
#[derive(Clone, Default)]
pub struct FakeTaskExecutor {
    scripts: Arc<Mutex<HashMap<TaskName, (Script, Duration)>>>,
    started: Arc<Mutex<Vec<TaskName>>>,
    finished: Arc<Mutex<Vec<TaskName>>>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl FakeTaskExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, task: &str, script: Script, delay: Duration) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(task.to_string(), (script, delay));
        self
    }

    pub fn fail(self, task: &str, code: i32) -> Self {
        self.script(task, Script::Fail(code), Duration::ZERO)
    }

    pub fn delay(self, task: &str, delay: Duration) -> Self {
        self.script(task, Script::Succeed, delay)
    }

    pub fn started(&self) -> Vec<TaskName> {
        self.started.lock().unwrap().clone()
    }

    pub fn finished(&self) -> Vec<TaskName> {
        self.finished.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl TaskExecutor for FakeTaskExecutor {
    fn execute<'a>(
        &'a self,
        task: &'a Task,
    ) -> Pin<Box<dyn Future<Output = Result<TaskOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let (script, delay) = self
                .scripts
                .lock()
                .unwrap()
                .get(&task.name)
                .copied()
                .unwrap_or((Script::Succeed, Duration::ZERO));

            self.started.lock().unwrap().push(task.name.clone());
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let _guard = RunningGuard {
                running: Arc::clone(&self.running),
            };

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            self.finished.lock().unwrap().push(task.name.clone());
            match script {
                Script::Succeed => Ok(TaskOutcome::Success),
                Script::Fail(code) => Ok(TaskOutcome::Failed(code)),
                Script::Error => Err(BobError::Other(anyhow::anyhow!(
                    "fake spawn failure for '{}'",
                    task.name
                ))),
            }
        })
    }
}
