mod common;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use bob::dag::{build_dependency_graph, filter_rebuild_set, select_tasks};
use bob::engine::BuildOptions;
use bob::errors::BobError;
use bob::fs::mock::MockFileSystem;
use bob_test_utils::builders::{mock_project, ProjectConfigBuilder};
use bob_test_utils::fake_executor::FakeTaskExecutor;
use common::{acyclic_decls, decls, hello_world_decls, init_tracing, with_timeout, TestResult};
use proptest::prelude::*;

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn task_set<'a>(tasks: impl Iterator<Item = &'a str>) -> BTreeSet<String> {
    tasks.map(str::to_string).collect()
}

#[test]
fn stale_task_propagates_to_dependents_only() -> TestResult {
    init_tracing();
    let graph = build_dependency_graph(Some(&hello_world_decls()))?;

    let rebuild = filter_rebuild_set(&graph, &|t: &str| t == "hello_world_4")?;

    assert_eq!(
        task_set(rebuild.tasks()),
        set(&["hello_world_2", "hello_world_3", "hello_world_4"])
    );
    // Sub-graph edges are preserved among the kept tasks.
    assert_eq!(rebuild.dependencies_of("hello_world_3"), ["hello_world_4".to_string()]);
    assert_eq!(rebuild.dependencies_of("hello_world_2"), ["hello_world_3".to_string()]);
    Ok(())
}

#[test]
fn chain_rebuilds_everything_downstream() -> TestResult {
    let graph = build_dependency_graph(Some(&decls(&[
        ("A", &[]),
        ("B", &["A"]),
        ("C", &["B"]),
    ])))?;

    let rebuild = filter_rebuild_set(&graph, &|t: &str| t == "A")?;
    assert_eq!(task_set(rebuild.tasks()), set(&["A", "B", "C"]));

    let rebuild = filter_rebuild_set(&graph, &|t: &str| t == "C")?;
    assert_eq!(task_set(rebuild.tasks()), set(&["C"]));
    Ok(())
}

#[test]
fn independent_chains_do_not_affect_each_other() -> TestResult {
    let graph = build_dependency_graph(Some(&decls(&[
        ("A", &[]),
        ("B", &["A"]),
        ("F", &[]),
        ("G", &["F"]),
    ])))?;

    let rebuild = filter_rebuild_set(&graph, &|t: &str| t == "F")?;
    assert_eq!(task_set(rebuild.tasks()), set(&["F", "G"]));
    Ok(())
}

#[test]
fn nothing_stale_means_nothing_to_rebuild() -> TestResult {
    let graph = build_dependency_graph(Some(&hello_world_decls()))?;
    let rebuild = filter_rebuild_set(&graph, &|_: &str| false)?;
    assert!(rebuild.is_empty());

    let rebuild = filter_rebuild_set(&graph, &|_: &str| true)?;
    assert_eq!(rebuild.len(), graph.len());
    Ok(())
}

#[test]
fn unchanged_task_without_dependencies_is_never_rebuilt() -> TestResult {
    let graph = build_dependency_graph(Some(&hello_world_decls()))?;
    let rebuild = filter_rebuild_set(&graph, &|t: &str| t == "hello_world_4")?;
    assert!(!rebuild.contains("hello_world_5"));
    assert!(!rebuild.contains("hello_world_6"));
    Ok(())
}

#[test]
fn select_matches_full_names_and_pulls_in_dependencies() -> TestResult {
    let graph = build_dependency_graph(Some(&hello_world_decls()))?;

    let selected = select_tasks(&graph, &["hello_world_3".to_string()])?;
    assert_eq!(
        task_set(selected.tasks()),
        set(&["hello_world_3", "hello_world_4", "hello_world_5"])
    );

    let selected = select_tasks(&graph, &["hello_world_[46]".to_string()])?;
    assert_eq!(
        task_set(selected.tasks()),
        set(&["hello_world_4", "hello_world_6"])
    );

    let all = select_tasks(&graph, &[])?;
    assert_eq!(all.len(), graph.len());
    Ok(())
}

#[test]
fn select_rejects_partial_and_invalid_patterns() -> TestResult {
    let graph = build_dependency_graph(Some(&hello_world_decls()))?;

    let err = select_tasks(&graph, &["hello".to_string()]).unwrap_err();
    assert!(matches!(err, BobError::ConfigError(_)), "got {err:?}");

    let err = select_tasks(&graph, &["hello_world_(".to_string()]).unwrap_err();
    assert!(matches!(err, BobError::ConfigError(_)), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn second_build_without_changes_rebuilds_nothing() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    let root = Path::new("/proj");
    let cfg = ProjectConfigBuilder::new()
        .with_task("hello_world_2", &["hello_world_3", "hello_world_6"])
        .with_task("hello_world_3", &["hello_world_4", "hello_world_5"])
        .with_task("hello_world_4", &[])
        .with_task("hello_world_5", &[])
        .with_task("hello_world_6", &[])
        .with_jobs(2)
        .build();
    let project = mock_project(&fs, root, cfg);

    // No store yet: everything is stale.
    assert_eq!(project.plan(&[])?.rebuild.len(), 5);

    let fake = FakeTaskExecutor::new();
    let report = with_timeout(project.build(Arc::new(fake.clone()), &BuildOptions::default())).await?;
    assert!(report.success());
    assert_eq!(report.result.rebuilt_count(), 5);

    let plan = project.plan(&[])?;
    assert!(plan.rebuild.is_empty());
    assert_eq!(plan.skipped(), 5);

    let report = with_timeout(project.build(Arc::new(fake.clone()), &BuildOptions::default())).await?;
    assert!(report.success());
    assert_eq!(report.result.rebuilt_count(), 0);
    assert_eq!(report.skipped, 5);
    assert_eq!(fake.started().len(), 5);
    Ok(())
}

#[tokio::test]
async fn edited_definition_rebuilds_task_and_dependents() -> TestResult {
    let fs = MockFileSystem::new();
    let root = Path::new("/proj");
    let cfg = ProjectConfigBuilder::new()
        .with_task("hello_world_2", &["hello_world_3", "hello_world_6"])
        .with_task("hello_world_3", &["hello_world_4", "hello_world_5"])
        .with_task("hello_world_4", &[])
        .with_task("hello_world_5", &[])
        .with_task("hello_world_6", &[])
        .build();
    let project = mock_project(&fs, root, cfg);

    let fake = FakeTaskExecutor::new();
    with_timeout(project.build(Arc::new(fake), &BuildOptions::default())).await?;

    fs.add_file(
        "/proj/hello_world_4/task.toml",
        "task_name = \"hello_world_4\"\ntask_type = \"c_compile\"\nsources = [\"*.c\"]\n",
    );

    let plan = project.plan(&[])?;
    assert_eq!(
        task_set(plan.rebuild.tasks()),
        set(&["hello_world_2", "hello_world_3", "hello_world_4"])
    );

    // Selection narrows the plan to the selected task and its dependencies.
    let plan = project.plan(&["hello_world_3".to_string()])?;
    assert_eq!(
        task_set(plan.rebuild.tasks()),
        set(&["hello_world_3", "hello_world_4"])
    );
    assert_eq!(plan.skipped(), 1);
    Ok(())
}

#[tokio::test]
async fn dirty_entry_forces_rebuild_even_with_matching_hash() -> TestResult {
    let fs = MockFileSystem::new();
    let root = Path::new("/proj");
    let cfg = ProjectConfigBuilder::new()
        .with_task("A", &[])
        .with_task("B", &["A"])
        .build();
    let project = mock_project(&fs, root, cfg);

    with_timeout(project.build(Arc::new(FakeTaskExecutor::new()), &BuildOptions::default()))
        .await?;
    project.checksum_store().mark_dirty("A")?;

    let plan = project.plan(&[])?;
    assert_eq!(task_set(plan.rebuild.tasks()), set(&["A", "B"]));
    Ok(())
}

proptest! {
    #[test]
    fn rebuild_set_is_upward_closure_of_stale_tasks(
        input in acyclic_decls(10),
        stale_mask in proptest::collection::vec(any::<bool>(), 10),
    ) {
        let graph = build_dependency_graph(Some(&input)).unwrap();
        let stale: BTreeSet<String> = graph
            .tasks()
            .enumerate()
            .filter(|(i, _)| stale_mask[*i])
            .map(|(_, t)| t.to_string())
            .collect();

        let rebuild = filter_rebuild_set(&graph, &|t: &str| stale.contains(t)).unwrap();

        // A task is rebuilt iff it, or anything it depends on, is stale.
        for task in graph.tasks() {
            let upstream = graph.with_transitive_dependencies([task]);
            let expected = !upstream.is_disjoint(&stale);
            prop_assert_eq!(rebuild.contains(task), expected, "task {}", task);
        }

        // Edges between rebuilt tasks survive.
        for (dep, dependent) in graph.edges() {
            if rebuild.contains(&dep) && rebuild.contains(&dependent) {
                prop_assert!(rebuild.dependencies_of(&dependent).contains(&dep));
            }
        }
    }
}
