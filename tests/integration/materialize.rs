//! Building projects from packages.
//!
//! Materialization moves the process working directory, so every test here is serial.

use proji_cli::core::{ProjiError, find_error};
use proji_cli::materializer::{ProjectMaterializer, workdir};
use proji_cli::test_utils::TestEnvironment;
use proji_cli::test_utils::fixtures::{demo_package, dir, file, templated_file};
use serial_test::serial;
use std::fs;
use tokio_util::sync::CancellationToken;

fn materializer(env: &TestEnvironment) -> ProjectMaterializer {
    ProjectMaterializer::new(&env.templates_dir, &env.plugins_dir)
}

#[tokio::test]
#[serial]
async fn test_demo_package_produces_tree() {
    let env = TestEnvironment::new().unwrap();
    env.write_template("tmpl/main.x.tmpl", "print(\"hello\")\n").unwrap();
    let root = env.project_path("demo");

    let report =
        materializer(&env).materialize(&demo_package(), &root, &CancellationToken::new()).await.unwrap();

    assert!(root.join("src").is_dir());
    assert_eq!(fs::read_to_string(root.join("src/main.x")).unwrap(), "print(\"hello\")\n");
    assert_eq!(report.entries, vec![root.join("src"), root.join("src/main.x")]);
    assert!(report.pre_plugins.is_empty());
    assert!(report.post_plugins.is_empty());
}

#[tokio::test]
#[serial]
async fn test_working_directory_restored_on_success() {
    let env = TestEnvironment::new().unwrap();
    env.write_template("tmpl/main.x.tmpl", "x").unwrap();
    let before = std::env::current_dir().unwrap();

    materializer(&env)
        .materialize(&demo_package(), &env.project_path("ok"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(std::env::current_dir().unwrap(), before);
    assert!(!workdir::is_held());
}

#[tokio::test]
#[serial]
async fn test_working_directory_restored_on_failure() {
    let env = TestEnvironment::new().unwrap();
    let mut package = demo_package();
    package.dir_tree.entries = vec![
        dir("src"),
        templated_file("src/missing.x", "tmpl/does-not-exist"),
        file("never.txt"),
    ];
    let root = env.project_path("broken");
    let before = std::env::current_dir().unwrap();

    let result = materializer(&env).materialize(&package, &root, &CancellationToken::new()).await;

    assert!(result.is_err());
    assert_eq!(std::env::current_dir().unwrap(), before);
    assert!(!workdir::is_held());
    // not transactional: earlier entries stay, later ones never happen
    assert!(root.join("src").is_dir());
    assert!(!root.join("never.txt").exists());
}

#[tokio::test]
#[serial]
async fn test_existing_root_is_a_conflict() {
    let env = TestEnvironment::new().unwrap();
    env.write_template("tmpl/main.x.tmpl", "x").unwrap();
    let root = env.project_path("taken");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("keep.txt"), "mine").unwrap();

    let err = materializer(&env)
        .materialize(&demo_package(), &root, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(find_error(&err), Some(ProjiError::Conflict { .. })));
    assert_eq!(fs::read_to_string(root.join("keep.txt")).unwrap(), "mine");
    assert!(!root.join("src").exists());
}

#[tokio::test]
#[serial]
async fn test_cancelled_before_start_creates_nothing() {
    let env = TestEnvironment::new().unwrap();
    env.write_template("tmpl/main.x.tmpl", "x").unwrap();
    let root = env.project_path("cancelled");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = materializer(&env).materialize(&demo_package(), &root, &cancel).await.unwrap_err();

    assert!(matches!(find_error(&err), Some(ProjiError::Cancelled { .. })));
    assert!(!root.exists());
}

#[cfg(unix)]
mod plugins {
    use super::*;
    use proji_cli::models::{Phase, PluginSchedule};
    use proji_cli::test_utils::fixtures::plugin;
    use std::time::Duration;

    #[tokio::test]
    #[serial]
    async fn test_phases_run_around_the_tree() {
        let env = TestEnvironment::new().unwrap();
        env.write_template("tmpl/main.x.tmpl", "x").unwrap();
        env.write_plugin(
            "pre.sh",
            "if [ -d src ]; then echo pre-late >> order.log; else echo pre >> order.log; fi\n",
        )
        .unwrap();
        env.write_plugin(
            "post.sh",
            "if [ -f src/main.x ]; then echo post >> order.log; else echo post-early >> order.log; fi\n\
             echo \"$PROJI_PACKAGE_LABEL $PROJI_PHASE\" >> order.log\n",
        )
        .unwrap();
        let mut package = demo_package();
        package.plugins = Some(PluginSchedule {
            pre: vec![plugin("pre.sh")],
            post: vec![plugin("post.sh")],
        });
        let root = env.project_path("phased");

        let report =
            materializer(&env).materialize(&package, &root, &CancellationToken::new()).await.unwrap();

        let log = fs::read_to_string(root.join("order.log")).unwrap();
        assert_eq!(log, "pre\npost\ndemo post\n");
        assert_eq!(report.pre_plugins, vec![env.plugins_dir.join("pre.sh")]);
        assert_eq!(report.post_plugins, vec![env.plugins_dir.join("post.sh")]);
    }

    #[tokio::test]
    #[serial]
    async fn test_failing_pre_plugin_stops_before_tree() {
        let env = TestEnvironment::new().unwrap();
        env.write_template("tmpl/main.x.tmpl", "x").unwrap();
        env.write_plugin("fail.sh", "echo boom >&2\nexit 3\n").unwrap();
        let mut package = demo_package();
        package.plugins = Some(PluginSchedule {
            pre: vec![plugin("fail.sh")],
            post: Vec::new(),
        });
        let root = env.project_path("failing");
        let before = std::env::current_dir().unwrap();

        let err =
            materializer(&env).materialize(&package, &root, &CancellationToken::new()).await.unwrap_err();

        match find_error(&err) {
            Some(ProjiError::PluginFailed {
                phase,
                ..
            }) => assert_eq!(*phase, Phase::Pre),
            other => panic!("expected a plugin failure, got {other:?}"),
        }
        assert_eq!(std::env::current_dir().unwrap(), before);
        assert!(root.is_dir());
        assert!(!root.join("src").exists());
    }

    #[tokio::test]
    #[serial]
    async fn test_cancellation_during_pre_phase_restores_directory() {
        let env = TestEnvironment::new().unwrap();
        env.write_template("tmpl/main.x.tmpl", "x").unwrap();
        env.write_plugin("slow.sh", "touch started\nsleep 5\n").unwrap();
        env.write_plugin("next.sh", "touch next.ran\n").unwrap();
        let mut package = demo_package();
        package.plugins = Some(PluginSchedule {
            pre: vec![plugin("slow.sh"), plugin("next.sh")],
            post: Vec::new(),
        });
        let root = env.project_path("interrupted");
        let before = std::env::current_dir().unwrap();
        let cancel = CancellationToken::new();

        let watcher = {
            let cancel = cancel.clone();
            let started = root.join("started");
            tokio::spawn(async move {
                while !started.exists() {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                cancel.cancel();
            })
        };

        let err = materializer(&env).materialize(&package, &root, &cancel).await.unwrap_err();
        watcher.await.unwrap();

        assert!(matches!(find_error(&err), Some(ProjiError::Cancelled { .. })));
        assert_eq!(std::env::current_dir().unwrap(), before);
        assert!(!workdir::is_held());
        assert!(root.join("started").is_file());
        assert!(!root.join("next.ran").exists());
        assert!(!root.join("src").exists());
    }
}
