//! Tests for the `proji` binary.
//!
//! Every test runs against its own [`ProjiHome`], so the user's configuration is never
//! read or written.

use crate::common::ProjiHome;
use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn home_with_skeleton() -> Result<ProjiHome> {
    let home = ProjiHome::new()?;
    home.run_proji(&["init"])?.assert_success();
    home.write_work_file("skeleton/README.md", "# readme")?;
    home.write_work_file("skeleton/src/lib.txt", "lib")?;
    home.write_work_file("skeleton/.git/HEAD", "ref: refs/heads/main")?;
    Ok(home)
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("proji")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("package"))
        .stdout(predicate::str::contains("new"));
}

#[test]
fn test_verbose_and_quiet_conflict() {
    Command::cargo_bin("proji")
        .unwrap()
        .args(["--verbose", "--quiet", "ls"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_init_creates_layout() -> Result<()> {
    let home = ProjiHome::new()?;

    home.run_proji(&["init"])?.assert_success().assert_stdout_contains("proji is ready");

    assert!(home.config_path().is_file());
    assert!(home.templates_path().is_dir());
    assert!(home.home_path().join("plugins").is_dir());
    assert!(home.home_path().join("data").is_dir());
    Ok(())
}

#[test]
fn test_folder_import_then_new_project() -> Result<()> {
    let home = home_with_skeleton()?;

    home.run_proji(&["package", "import", "--folder", "skeleton", "--label", "sk"])?
        .assert_success()
        .assert_stdout_contains("as sk");
    home.run_proji(&["package", "ls"])?.assert_success().assert_stdout_contains("sk");

    let shown = home.run_proji(&["package", "show", "sk", "--format", "json"])?;
    shown.assert_success();
    assert!(shown.stdout.contains("src/lib.txt"));
    assert!(!shown.stdout.contains(".git"));

    home.run_proji(&["new", "sk", "app"])?.assert_success().assert_stdout_contains("Created");

    let app = home.work_path().join("app");
    assert!(app.join("src").is_dir());
    assert!(app.join("src/lib.txt").is_file());
    assert!(app.join("README.md").is_file());
    assert_eq!(fs::read_to_string(app.join("README.md"))?, "");
    assert!(!app.join(".git").exists());

    home.run_proji(&["ls"])?.assert_success().assert_stdout_contains("app");
    Ok(())
}

#[test]
fn test_new_into_existing_directory_fails() -> Result<()> {
    let home = home_with_skeleton()?;
    home.run_proji(&["package", "import", "--folder", "skeleton", "--label", "sk"])?
        .assert_success();
    fs::create_dir_all(home.work_path().join("taken"))?;

    home.run_proji(&["new", "sk", "taken"])?.assert_failure().assert_stderr_contains("already exists");
    home.run_proji(&["ls"])?.assert_success().assert_stdout_contains("No projects.");
    Ok(())
}

#[test]
fn test_unknown_package_fails() -> Result<()> {
    let home = ProjiHome::new()?;
    home.run_proji(&["init"])?.assert_success();

    home.run_proji(&["new", "nope", "app"])?.assert_failure().assert_stderr_contains("not found");
    assert!(!home.work_path().join("app").exists());
    Ok(())
}

#[test]
fn test_export_and_reimport() -> Result<()> {
    let home = home_with_skeleton()?;
    home.run_proji(&["package", "import", "--folder", "skeleton", "--label", "sk"])?
        .assert_success();

    home.run_proji(&["package", "export", "sk"])?.assert_success();
    let exported = home.work_path().join("proji-sk.toml");
    assert!(exported.is_file());

    home.run_proji(&["package", "export", "sk"])?
        .assert_failure()
        .assert_stderr_contains("already exists");

    home.run_proji(&["package", "import", "--file", "proji-sk.toml"])?
        .assert_failure()
        .assert_stderr_contains("already exists");

    home.run_proji(&["package", "rm", "sk"])?.assert_success();
    home.run_proji(&["package", "ls"])?.assert_success().assert_stdout_contains("No packages.");

    home.run_proji(&["package", "import", "--file", "proji-sk.toml"])?
        .assert_success()
        .assert_stdout_contains("as sk");
    Ok(())
}

#[test]
fn test_remove_purge_and_clean() -> Result<()> {
    let home = home_with_skeleton()?;
    home.run_proji(&["package", "import", "--folder", "skeleton", "--label", "sk"])?
        .assert_success();
    home.run_proji(&["new", "sk", "one"])?.assert_success();
    home.run_proji(&["new", "sk", "two"])?.assert_success();

    home.run_proji(&["rm", "one"])?.assert_success().assert_stdout_contains("Removed 'one'");
    assert!(home.work_path().join("one").is_dir());

    let all = home.run_proji(&["ls", "--all"])?;
    all.assert_success().assert_stdout_contains("(removed)");

    fs::remove_dir_all(home.work_path().join("two"))?;
    home.run_proji(&["clean"])?.assert_success().assert_stdout_contains("Removed 'two'");
    home.run_proji(&["ls"])?.assert_success().assert_stdout_contains("No projects.");
    home.run_proji(&["clean"])?.assert_success().assert_stdout_contains("Nothing to clean.");
    Ok(())
}

#[test]
fn test_set_renames_project() -> Result<()> {
    let home = home_with_skeleton()?;
    home.run_proji(&["package", "import", "--folder", "skeleton", "--label", "sk"])?
        .assert_success();
    home.run_proji(&["new", "sk", "app"])?.assert_success();

    home.run_proji(&["set", "app", "--name", "service", "--description", "backend"])?
        .assert_success()
        .assert_stdout_contains("Updated 'service'");

    let shown = home.run_proji(&["show", "app"])?;
    shown.assert_success().assert_stdout_contains("service").assert_stdout_contains("backend");
    Ok(())
}
