mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bob::config::{load_and_validate, project_root, EnvValue};
use bob::engine::Project;
use bob::errors::BobError;
use bob::fs::{FileSystem, RealFileSystem};
use bob::task::{TaskKind, PATH_SEPARATOR};
use common::{init_tracing, TestResult};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

fn real_fs() -> Arc<dyn FileSystem> {
    Arc::new(RealFileSystem)
}

/// Two C tasks: `app` depends on `lib`.
fn two_task_project() -> TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(
        root,
        "bob.toml",
        r#"
[config]
jobs = 2

[tools]
gcc = "/opt/gcc/bin/gcc"

[tasks.lib]

[tasks.app]
depends_on = ["lib"]
"#,
    );
    write(
        root,
        "lib/task.toml",
        r#"
task_name = "lib"
task_type = "c_compile"
sources = ["src/*.c"]
include_dirs = ["lib/include"]

[env]
CFLAGS = "-O2"
"#,
    );
    write(root, "lib/src/a.c", "int a;");
    write(root, "lib/src/b.c", "int b;");
    write(root, "lib/src/notes.txt", "not a source");
    write(
        root,
        "app/task.toml",
        r#"
task_name = "app"
task_type = "c_compile"
sources = ["main.c"]
executable_name = "app"
external_objects = ["build/lib/a.o"]

[env]
EXTRA_PATHS = ["/x", "/y"]
"#,
    );
    write(root, "app/main.c", "int main() { return 0; }");
    tmp
}

#[test]
fn loads_config_sections() -> TestResult {
    init_tracing();
    let tmp = two_task_project();
    let cfg = load_and_validate(&RealFileSystem, tmp.path().join("bob.toml"))?;

    assert_eq!(cfg.config.jobs, 2);
    assert_eq!(cfg.config.state_dir, PathBuf::from(".bob"));
    assert_eq!(cfg.config.build_dir, PathBuf::from("build"));
    assert_eq!(cfg.tools["gcc"], PathBuf::from("/opt/gcc/bin/gcc"));
    assert_eq!(cfg.task_names(), vec!["app".to_string(), "lib".to_string()]);
    assert_eq!(cfg.dependency_map()["app"], vec!["lib".to_string()]);
    Ok(())
}

#[test]
fn discovers_and_resolves_tasks() -> TestResult {
    let tmp = two_task_project();
    let root = tmp.path();
    let project = Project::load(real_fs(), &root.join("bob.toml"))?;

    assert_eq!(project.graph().dependencies_of("app"), ["lib".to_string()]);

    let lib = project.registry().get("lib").expect("lib resolved");
    assert_eq!(lib.definition_file, root.join("lib/task.toml"));
    assert_eq!(
        lib.sources,
        vec![root.join("lib/src/a.c"), root.join("lib/src/b.c")]
    );
    assert_eq!(lib.output_dir, root.join("build/lib"));
    match &lib.kind {
        TaskKind::CCompile(spec) => {
            assert_eq!(spec.include_dirs, vec![root.join("lib/include")]);
            assert_eq!(spec.executable_name, None);
        }
        other => panic!("unexpected kind {other:?}"),
    }
    assert_eq!(lib.env.get("CFLAGS"), Some("-O2"));
    let expected_srcs = format!(
        "{}{}{}",
        root.join("lib/src/a.c").display(),
        PATH_SEPARATOR,
        root.join("lib/src/b.c").display()
    );
    assert_eq!(lib.env.get("C_COMPILE_SRC_FILES"), Some(expected_srcs.as_str()));

    let app = project.registry().get("app").expect("app resolved");
    assert_eq!(app.sources, vec![root.join("app/main.c")]);
    // External objects count as inputs.
    assert!(app.input_files.contains(&root.join("build/lib/a.o")));
    assert_eq!(
        app.env.get("C_COMPILE_EXECUTABLE_PATH"),
        Some(root.join("build/app/app").to_string_lossy().as_ref())
    );
    assert_eq!(
        app.env.get("EXTRA_PATHS"),
        Some(format!("/x{PATH_SEPARATOR}/y").as_str())
    );
    Ok(())
}

#[test]
fn missing_task_section_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write(tmp.path(), "bob.toml", "[config]\njobs = 1\n");

    let err = Project::load(real_fs(), &config).unwrap_err();
    assert!(matches!(err, BobError::ConfigError(_)), "got {err:?}");
}

#[test]
fn unknown_dependency_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write(
        tmp.path(),
        "bob.toml",
        "[tasks.a]\ndepends_on = [\"missing\"]\n",
    );

    let err = load_and_validate(&RealFileSystem, &config).unwrap_err();
    match err {
        BobError::ConfigError(msg) => assert!(msg.contains("missing"), "message: {msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn cycle_is_rejected_before_any_state_is_written() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let config = write(
        root,
        "bob.toml",
        "[tasks.a]\ndepends_on = [\"b\"]\n\n[tasks.b]\ndepends_on = [\"a\"]\n",
    );
    write(root, "a/task.toml", "task_name = \"a\"\ntask_type = \"c_compile\"\n");
    write(root, "b/task.toml", "task_name = \"b\"\ntask_type = \"c_compile\"\n");

    let err = Project::load(real_fs(), &config).unwrap_err();
    assert!(matches!(err, BobError::DagCycle(_)), "got {err:?}");
    assert!(!root.join(".bob").exists());
}

#[test]
fn undeclared_definition_is_rejected() {
    let tmp = two_task_project();
    write(
        tmp.path(),
        "extra/task.toml",
        "task_name = \"extra\"\ntask_type = \"c_compile\"\n",
    );

    let err = Project::load(real_fs(), &tmp.path().join("bob.toml")).unwrap_err();
    match err {
        BobError::ConfigError(msg) => assert!(msg.contains("extra"), "message: {msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn declared_task_without_definition_is_rejected() {
    let tmp = two_task_project();
    fs::remove_file(tmp.path().join("app/task.toml")).unwrap();

    let err = Project::load(real_fs(), &tmp.path().join("bob.toml")).unwrap_err();
    match err {
        BobError::ConfigError(msg) => assert!(msg.contains("app"), "message: {msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn duplicate_task_name_is_rejected() {
    let tmp = two_task_project();
    write(
        tmp.path(),
        "copy/task.toml",
        "task_name = \"lib\"\ntask_type = \"c_compile\"\n",
    );

    let err = Project::load(real_fs(), &tmp.path().join("bob.toml")).unwrap_err();
    match err {
        BobError::ConfigError(msg) => assert!(msg.contains("duplicate"), "message: {msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn build_and_hidden_directories_are_not_searched() -> TestResult {
    let tmp = two_task_project();
    write(
        tmp.path(),
        "build/stale/task.toml",
        "task_name = \"stale\"\ntask_type = \"c_compile\"\n",
    );
    write(
        tmp.path(),
        ".git/hooks/task.toml",
        "task_name = \"hidden\"\ntask_type = \"c_compile\"\n",
    );

    let project = Project::load(real_fs(), &tmp.path().join("bob.toml"))?;
    assert_eq!(project.registry().names(), vec!["app".to_string(), "lib".to_string()]);
    Ok(())
}

#[test]
fn unknown_task_type_loads_as_unsupported() -> TestResult {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let config = write(root, "bob.toml", "[tasks.odd]\n");
    write(root, "odd/task.toml", "task_name = \"odd\"\ntask_type = \"fortran\"\n");

    let project = Project::load(real_fs(), &config)?;
    let odd = project.registry().get("odd").expect("odd resolved");
    assert_eq!(
        odd.kind,
        TaskKind::Unsupported {
            task_type: "fortran".to_string()
        }
    );
    Ok(())
}

#[test]
fn unknown_definition_field_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let config = write(root, "bob.toml", "[tasks.t]\n");
    write(
        root,
        "t/task.toml",
        "task_name = \"t\"\ntask_type = \"c_compile\"\nsauces = [\"x.c\"]\n",
    );

    let err = Project::load(real_fs(), &config).unwrap_err();
    assert!(matches!(err, BobError::ConfigError(_)), "got {err:?}");
}

#[test]
fn state_and_build_dir_must_differ() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write(
        tmp.path(),
        "bob.toml",
        "[config]\nstate_dir = \"out\"\nbuild_dir = \"out\"\n\n[tasks.a]\n",
    );

    let err = load_and_validate(&RealFileSystem, &config).unwrap_err();
    assert!(matches!(err, BobError::ConfigError(_)), "got {err:?}");
}

#[test]
fn env_values_accept_string_or_list() -> TestResult {
    #[derive(serde::Deserialize)]
    struct Holder {
        v: EnvValue,
    }

    let one: Holder = toml::from_str("v = \"a\"")?;
    let many: Holder = toml::from_str("v = [\"a\", \"b\"]")?;
    assert_eq!(one.v.values(), vec!["a".to_string()]);
    assert_eq!(many.v.values(), vec!["a".to_string(), "b".to_string()]);
    Ok(())
}

#[test]
fn project_root_is_config_parent() {
    assert_eq!(project_root(Path::new("/a/b/bob.toml")), PathBuf::from("/a/b"));
    assert_eq!(project_root(Path::new("bob.toml")), PathBuf::from("."));
}
