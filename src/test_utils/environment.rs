//! Test environment setup and management
//!
//! A [`TestEnvironment`] is a temporary base directory laid out the way the CLI lays out
//! its own: `templates/`, `plugins/` and `data/`, plus a `projects/` directory to
//! materialize into.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::config::{Config, PathsConfig};
use crate::platform::{Platform, PlatformRegistry};
use crate::resolver::DependencyResolver;

/// Temporary proji base directory.
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub base_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub plugins_dir: PathBuf,
    pub data_dir: PathBuf,
    pub projects_dir: PathBuf,
}

impl TestEnvironment {
    /// Create a new test environment
    pub fn new() -> Result<Self> {
        super::init_test_logging(None);

        let temp_dir = TempDir::new()?;
        let base_dir = temp_dir.path().join("base");
        let templates_dir = base_dir.join("templates");
        let plugins_dir = base_dir.join("plugins");
        let data_dir = base_dir.join("data");
        let projects_dir = temp_dir.path().join("projects");

        for dir in [&templates_dir, &plugins_dir, &data_dir, &projects_dir] {
            fs::create_dir_all(dir)?;
        }

        Ok(Self {
            temp_dir,
            base_dir,
            templates_dir,
            plugins_dir,
            data_dir,
            projects_dir,
        })
    }

    /// Configuration pointing at this environment.
    pub fn config(&self) -> Config {
        Config {
            paths: PathsConfig {
                base: Some(self.base_dir.to_string_lossy().into_owned()),
            },
            source: Some(self.base_dir.join("config.toml")),
            ..Config::default()
        }
    }

    /// Resolver with `platform` serving `host` and the environment's cache directories.
    pub fn resolver_with(&self, host: &str, platform: Arc<dyn Platform>) -> DependencyResolver {
        let mut registry = PlatformRegistry::empty();
        registry.register(host, platform);
        DependencyResolver::new(registry, &self.templates_dir, &self.plugins_dir)
    }

    /// Resolver that knows no platform at all.
    pub fn offline_resolver(&self) -> DependencyResolver {
        DependencyResolver::new(PlatformRegistry::empty(), &self.templates_dir, &self.plugins_dir)
    }

    /// Put a file into the template cache.
    pub fn write_template(&self, relative: &str, content: &str) -> Result<PathBuf> {
        write(&self.templates_dir, relative, content)
    }

    /// Put a script into the plugin cache.
    pub fn write_plugin(&self, relative: &str, content: &str) -> Result<PathBuf> {
        write(&self.plugins_dir, relative, content)
    }

    /// Path for a project that does not exist yet.
    pub fn project_path(&self, name: &str) -> PathBuf {
        self.projects_dir.join(name)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
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
