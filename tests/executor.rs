mod common;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bob::cache::ChecksumStore;
use bob::dag::{build_dependency_graph, schedule};
use bob::engine::{BuildOptions, Executor, Project, TaskState};
use bob::fs::mock::MockFileSystem;
use bob::fs::FileSystem;
use bob_test_utils::builders::{mock_project, mock_registry, ProjectConfigBuilder};
use bob_test_utils::fake_executor::{FakeTaskExecutor, Script};
use common::{decls, init_tracing, with_timeout, TestResult};

const ROOT: &str = "/proj";

fn project(fs: &MockFileSystem, builder: ProjectConfigBuilder) -> Project {
    mock_project(fs, Path::new(ROOT), builder.build())
}

fn independent(names: &[&str], jobs: usize) -> ProjectConfigBuilder {
    names
        .iter()
        .fold(ProjectConfigBuilder::new().with_jobs(jobs), |b, n| {
            b.with_task(n, &[])
        })
}

#[tokio::test]
async fn first_failure_aborts_in_flight_tasks() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    let project = project(&fs, independent(&["A", "B", "C"], 3));
    let fake = FakeTaskExecutor::new()
        .script("A", Script::Fail(2), Duration::from_millis(20))
        .delay("B", Duration::from_secs(3))
        .delay("C", Duration::from_secs(3));

    let report = with_timeout(project.build(Arc::new(fake.clone()), &BuildOptions::default())).await?;

    assert!(!report.success());
    let failure = report.result.failure.clone().expect("failure recorded");
    assert_eq!(failure.task, "A");
    assert_eq!(failure.exit_code, Some(2));
    assert_eq!(failure.log_path, Some(Path::new("/proj/build/A/A.log").to_path_buf()));

    assert_eq!(report.result.state_of("A"), Some(TaskState::Failed));
    assert_eq!(report.result.state_of("B"), Some(TaskState::Aborted));
    assert_eq!(report.result.state_of("C"), Some(TaskState::Aborted));
    assert!(report.result.rebuilt.is_empty());

    // B and C were running and got cancelled before finishing.
    assert_eq!(fake.started().len(), 3);
    assert_eq!(fake.finished(), vec!["A".to_string()]);
    Ok(())
}

#[tokio::test]
async fn dependents_of_a_failed_task_never_start() -> TestResult {
    let fs = MockFileSystem::new();
    let builder = ProjectConfigBuilder::new()
        .with_task("A", &[])
        .with_task("B", &["A"])
        .with_task("C", &["B"])
        .with_jobs(4);
    let project = project(&fs, builder);
    let fake = FakeTaskExecutor::new().fail("A", 1);

    let report = with_timeout(project.build(Arc::new(fake.clone()), &BuildOptions::default())).await?;

    assert!(!report.success());
    assert_eq!(fake.started(), vec!["A".to_string()]);
    assert_eq!(report.result.state_of("B"), Some(TaskState::Aborted));
    assert_eq!(report.result.state_of("C"), Some(TaskState::Aborted));
    Ok(())
}

#[tokio::test]
async fn chain_runs_in_dependency_order() -> TestResult {
    let fs = MockFileSystem::new();
    let builder = ProjectConfigBuilder::new()
        .with_task("A", &[])
        .with_task("B", &["A"])
        .with_task("C", &["B"])
        .with_jobs(4);
    let project = project(&fs, builder);
    let fake = FakeTaskExecutor::new().delay("A", Duration::from_millis(10));

    let report = with_timeout(project.build(Arc::new(fake.clone()), &BuildOptions::default())).await?;

    assert!(report.success());
    let expected: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
    assert_eq!(fake.started(), expected);
    assert_eq!(report.result.rebuilt, expected);
    assert_eq!(fake.peak_concurrency(), 1);
    assert!(report
        .result
        .states
        .values()
        .all(|s| *s == TaskState::Succeeded));
    Ok(())
}

#[tokio::test]
async fn worker_pool_is_bounded_by_jobs() -> TestResult {
    let fs = MockFileSystem::new();
    let names = ["t1", "t2", "t3", "t4", "t5", "t6"];
    let project = project(&fs, independent(&names, 2));
    let fake = names.iter().fold(FakeTaskExecutor::new(), |f, n| {
        f.delay(n, Duration::from_millis(30))
    });

    let report = with_timeout(project.build(Arc::new(fake.clone()), &BuildOptions::default())).await?;

    assert!(report.success());
    assert_eq!(report.result.rebuilt_count(), 6);
    assert_eq!(fake.peak_concurrency(), 2);
    Ok(())
}

#[tokio::test]
async fn jobs_option_overrides_config() -> TestResult {
    let fs = MockFileSystem::new();
    let names = ["t1", "t2", "t3"];
    let project = project(&fs, independent(&names, 8));
    let fake = names.iter().fold(FakeTaskExecutor::new(), |f, n| {
        f.delay(n, Duration::from_millis(20))
    });
    let options = BuildOptions {
        jobs: Some(1),
        ..BuildOptions::default()
    };

    let report = with_timeout(project.build(Arc::new(fake.clone()), &options)).await?;

    assert!(report.success());
    assert_eq!(fake.peak_concurrency(), 1);
    Ok(())
}

#[tokio::test]
async fn store_is_clean_after_success_and_dirty_after_failure() -> TestResult {
    let fs = MockFileSystem::new();
    let builder = ProjectConfigBuilder::new()
        .with_task("A", &[])
        .with_task("B", &["A"]);
    let project = project(&fs, builder);

    let report = with_timeout(project.build(
        Arc::new(FakeTaskExecutor::new()),
        &BuildOptions::default(),
    ))
    .await?;
    assert!(report.success());

    let entries = project.checksum_store().load()?;
    for (task, entry) in &entries {
        assert!(!entry.dirty, "{task} should be clean");
        assert_eq!(entry.hash.len(), 64);
    }
    let hash_b = entries["B"].hash.clone();

    // Force both stale, then fail B: A is clean again, B stays dirty.
    project.checksum_store().mark_all_dirty(&project.registry().names())?;
    let fake = FakeTaskExecutor::new().fail("B", 3);
    let report = with_timeout(project.build(Arc::new(fake), &BuildOptions::default())).await?;
    assert!(!report.success());
    assert_eq!(report.result.rebuilt, vec!["A".to_string()]);

    let entries = project.checksum_store().load()?;
    assert!(!entries["A"].dirty);
    assert!(entries["B"].dirty);
    // A failed run keeps the hash of the last successful one.
    assert_eq!(entries["B"].hash, hash_b);
    Ok(())
}

#[tokio::test]
async fn executor_error_fails_build_without_exit_code() -> TestResult {
    let fs = MockFileSystem::new();
    let project = project(&fs, independent(&["A"], 1));
    let fake = FakeTaskExecutor::new().script("A", Script::Error, Duration::ZERO);

    let report = with_timeout(project.build(Arc::new(fake), &BuildOptions::default())).await?;

    assert!(!report.success());
    let failure = report.result.failure.expect("failure recorded");
    assert_eq!(failure.task, "A");
    assert_eq!(failure.exit_code, None);
    Ok(())
}

#[tokio::test]
async fn selection_limits_what_runs() -> TestResult {
    let fs = MockFileSystem::new();
    let builder = ProjectConfigBuilder::new()
        .with_task("A", &[])
        .with_task("B", &["A"])
        .with_task("C", &[]);
    let project = project(&fs, builder);
    let fake = FakeTaskExecutor::new();
    let options = BuildOptions {
        patterns: vec!["B".to_string()],
        jobs: None,
    };

    let report = with_timeout(project.build(Arc::new(fake.clone()), &options)).await?;

    assert!(report.success());
    assert_eq!(fake.started(), vec!["A".to_string(), "B".to_string()]);
    // Unselected tasks still get a store entry.
    assert!(project.checksum_store().load()?.contains_key("C"));
    Ok(())
}

#[tokio::test]
async fn output_directories_are_created_for_rebuilt_tasks() -> TestResult {
    let fs = MockFileSystem::new();
    let project = project(&fs, independent(&["A"], 1));

    with_timeout(project.build(Arc::new(FakeTaskExecutor::new()), &BuildOptions::default()))
        .await?;

    assert!(fs.is_dir(Path::new("/proj/build/A")));
    Ok(())
}

#[tokio::test]
async fn empty_rebuild_set_succeeds_immediately() -> TestResult {
    let fs = MockFileSystem::new();
    let root = Path::new(ROOT);
    let cfg = ProjectConfigBuilder::new().with_task("A", &[]).build();
    let registry = Arc::new(mock_registry(&fs, root, &cfg));
    let mut store = ChecksumStore::new(Arc::new(fs.clone()), &root.join(".bob"), cfg.task_names());
    store.ensure(&cfg.task_names())?;

    let empty = build_dependency_graph(Some(&decls(&[])))?;
    let fake = FakeTaskExecutor::new();
    let executor = Executor::new(
        registry,
        Arc::new(Mutex::new(store)),
        Arc::new(fake.clone()),
        Arc::new(fs.clone()),
        4,
    );

    let result = with_timeout(executor.run(&empty, schedule(&empty))).await;

    assert!(result.success);
    assert!(result.rebuilt.is_empty());
    assert!(result.failure.is_none());
    assert!(fake.started().is_empty());
    Ok(())
}

#[tokio::test]
async fn unregistered_task_fails_the_build() -> TestResult {
    let fs = MockFileSystem::new();
    let root = Path::new(ROOT);
    let cfg = ProjectConfigBuilder::new().with_task("A", &[]).build();
    let registry = Arc::new(mock_registry(&fs, root, &cfg));
    let mut store = ChecksumStore::new(Arc::new(fs.clone()), &root.join(".bob"), cfg.task_names());
    store.ensure(&cfg.task_names())?;

    let graph = build_dependency_graph(Some(&decls(&[("ghost", &[])])))?;
    let fake = FakeTaskExecutor::new();
    let executor = Executor::new(
        registry,
        Arc::new(Mutex::new(store)),
        Arc::new(fake.clone()),
        Arc::new(fs.clone()),
        1,
    );

    let result = with_timeout(executor.run(&graph, schedule(&graph))).await;

    assert!(!result.success);
    assert_eq!(result.failure.map(|f| f.task), Some("ghost".to_string()));
    assert!(fake.started().is_empty());
    Ok(())
}
