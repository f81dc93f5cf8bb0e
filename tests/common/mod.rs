//! Common helpers for proji integration tests
//!
//! [`ProjiHome`] is an isolated proji installation: a temporary base directory with its
//! own config file, plus a working directory the binary runs in.

// Not every test module uses every helper
#![allow(dead_code)]

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub struct ProjiHome {
    _temp_dir: TempDir,
    home_dir: PathBuf,
    work_dir: PathBuf,
}

impl ProjiHome {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let home_dir = temp_dir.path().join("home");
        let work_dir = temp_dir.path().join("work");
        fs::create_dir_all(&home_dir)?;
        fs::create_dir_all(&work_dir)?;

        Ok(Self {
            _temp_dir: temp_dir,
            home_dir,
            work_dir,
        })
    }

    pub fn config_path(&self) -> PathBuf {
        self.home_dir.join("config.toml")
    }

    pub fn home_path(&self) -> &Path {
        &self.home_dir
    }

    pub fn work_path(&self) -> &Path {
        &self.work_dir
    }

    pub fn templates_path(&self) -> PathBuf {
        self.home_dir.join("templates")
    }

    /// Put a file into the template cache.
    pub fn write_template(&self, relative: &str, content: &str) -> Result<PathBuf> {
        write(&self.templates_path(), relative, content)
    }

    /// Write a file relative to the working directory.
    pub fn write_work_file(&self, relative: &str, content: &str) -> Result<PathBuf> {
        write(&self.work_dir, relative, content)
    }

    /// Run the `proji` binary against this home, inside the working directory.
    pub fn run_proji(&self, args: &[&str]) -> Result<CommandOutput> {
        let binary = env!("CARGO_BIN_EXE_proji");
        let output = Command::new(binary)
            .arg("--config")
            .arg(self.config_path())
            .args(args)
            .current_dir(&self.work_dir)
            .env("NO_COLOR", "1")
            .env_remove("PROJI_CONFIG")
            .env_remove("PROJI_GITHUB_TOKEN")
            .env_remove("PROJI_GITLAB_TOKEN")
            .env_remove("RUST_LOG")
            .output()
            .context("Failed to run proji")?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}

fn write(root: &Path, relative: &str, content: &str) -> Result<PathBuf> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn assert_success(&self) -> &Self {
        assert!(
            self.success,
            "Command failed with code {:?}\nStderr: {}",
            self.code, self.stderr
        );
        self
    }

    pub fn assert_failure(&self) -> &Self {
        assert!(!self.success, "Command unexpectedly succeeded\nStdout: {}", self.stdout);
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Expected stdout to contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Expected stderr to contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}
