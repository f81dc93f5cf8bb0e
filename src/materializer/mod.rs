//! Project materialization.
//!
//! [`ProjectMaterializer::materialize`] turns a resolved [`Package`] into a project on
//! disk. The steps run strictly in order:
//!
//! 1. **Create root**: the project directory must not exist yet. The working directory
//!    is reserved first ([`Reservation`]), so a rejected call creates nothing.
//! 2. **Enter**: the process working directory moves into the root ([`WorkingDirGuard`])
//! 3. **Pre plugins**, in list order
//! 4. **Tree**: entries in tree order. Plain entries become empty files or directories;
//!    templated entries are copied from the template cache.
//! 5. **Post plugins**, in list order
//! 6. **Leave**: the previous working directory is restored, on success and on failure
//!
//! All paths are absolute and derived from the root; the working directory switch only
//! exists for plugins and scripts that rely on it.
//!
//! Materialization is not transactional. When a step fails, whatever was created so far
//! stays on disk.

pub mod plugin;
pub mod workdir;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::{ProjiError, checkpoint};
use crate::models::{DirEntry, Package, Phase, Plugin, has_upstream};
use crate::utils::fs::absolute;
use crate::utils::{copy_dir, ensure_parent_dir, path_exists};

pub use plugin::{PluginContext, PluginRunner};
pub use workdir::{Reservation, WorkingDirGuard};

/// What a materialization produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Materialization {
    /// Absolute project root
    pub root: PathBuf,
    /// Absolute paths of the tree entries, in creation order
    pub entries: Vec<PathBuf>,
    /// Scripts run before the tree was built
    pub pre_plugins: Vec<PathBuf>,
    /// Scripts run after the tree was built
    pub post_plugins: Vec<PathBuf>,
}

/// Builds projects from packages whose dependencies are cached locally.
#[derive(Debug, Clone)]
pub struct ProjectMaterializer {
    templates_dir: PathBuf,
    plugins: PluginRunner,
}

impl ProjectMaterializer {
    pub fn new(templates_dir: impl Into<PathBuf>, plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            plugins: PluginRunner::new(plugins_dir),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.templates_dir()?, config.plugins_dir()?))
    }

    /// Materialize `package` at `root`.
    ///
    /// # Errors
    ///
    /// - [`ProjiError::InvalidInput`] if the package is malformed, has unresolved
    ///   dependencies, or another materialization holds the working directory
    /// - [`ProjiError::Conflict`] if `root` already exists
    /// - [`ProjiError::PluginFailed`] if a plugin fails
    /// - [`ProjiError::Cancelled`] if the token fires between steps or during a plugin
    /// - I/O errors from creating entries or copying templates
    pub async fn materialize(
        &self,
        package: &Package,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<Materialization> {
        package.validate()?;
        ensure_resolved(package)?;
        checkpoint(cancel, "materialization")?;

        let root = absolute(root)?;
        let reservation = Reservation::acquire(&root)?;
        tracing::info!("Creating base directory {}", root.display());
        create_root(&root).await?;

        let guard = reservation.enter(&root)?;
        let result = self.populate(package, &root, cancel).await;
        let left = guard.leave();

        let report = result
            .with_context(|| format!("Failed to build project at {} from '{}'", root.display(), package.label))?;
        left?;
        Ok(report)
    }

    async fn populate(
        &self,
        package: &Package,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<Materialization> {
        let mut report = Materialization {
            root: root.to_path_buf(),
            ..Materialization::default()
        };

        report.pre_plugins =
            self.run_phase(package, root, Phase::Pre, package.pre_plugins(), cancel).await?;

        self.build_tree(package, root, cancel, &mut report).await?;

        report.post_plugins =
            self.run_phase(package, root, Phase::Post, package.post_plugins(), cancel).await?;

        Ok(report)
    }

    async fn build_tree(
        &self,
        package: &Package,
        root: &Path,
        cancel: &CancellationToken,
        report: &mut Materialization,
    ) -> Result<()> {
        tracing::info!("Creating project structure");
        for entry in &package.dir_tree.entries {
            checkpoint(cancel, "project structure")?;
            let created = self.build_entry(entry, root).await?;
            report.entries.push(created);
        }
        Ok(())
    }

    async fn run_phase(
        &self,
        package: &Package,
        root: &Path,
        phase: Phase,
        plugins: &[Plugin],
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>> {
        let context = PluginContext {
            root,
            label: &package.label,
            phase,
        };

        let mut ran = Vec::with_capacity(plugins.len());
        for plugin in plugins {
            checkpoint(cancel, &format!("{phase} plugins"))?;
            if plugin.path.is_empty() {
                tracing::warn!("{phase} plugin without a path; skipping");
                continue;
            }

            let script = self.plugins.script_path(plugin);
            tracing::info!(
                "Running {phase} plugin {}",
                script.file_name().map_or_else(|| plugin.path.clone(), |name| name.to_string_lossy().into_owned())
            );
            self.plugins.run(plugin, context, cancel).await?;
            ran.push(script);
        }
        Ok(ran)
    }

    async fn build_entry(&self, entry: &DirEntry, root: &Path) -> Result<PathBuf> {
        let Some(template) = &entry.template else {
            let target = root.join(&entry.path);
            if entry.is_dir {
                tracing::debug!("creating directory {}", target.display());
                tokio::fs::create_dir_all(&target)
                    .await
                    .with_context(|| format!("Failed to create directory {}", target.display()))?;
            } else {
                tracing::debug!("creating file {}", target.display());
                ensure_parent_dir(&target)?;
                tokio::fs::File::create(&target)
                    .await
                    .with_context(|| format!("Failed to create file {}", target.display()))?;
            }
            return Ok(target);
        };

        let destination = if template.destination.is_empty() {
            &entry.path
        } else {
            &template.destination
        };
        let target = root.join(destination);
        let source = self.template_path(&template.path);
        tracing::debug!("copying template {} to {}", source.display(), target.display());

        if template.is_file {
            ensure_parent_dir(&target)?;
            tokio::fs::copy(&source, &target).await.with_context(|| {
                format!("Failed to copy template {} to {}", source.display(), target.display())
            })?;
        } else {
            if !path_exists(&source).await {
                return Err(ProjiError::not_found(format!("template directory {}", source.display()))
                    .into());
            }
            copy_dir(&source, &target)?;
        }
        Ok(target)
    }

    fn template_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.templates_dir.join(path)
        }
    }
}

/// The root is created on its own; an existing root is a conflict.
async fn create_root(root: &Path) -> Result<()> {
    if path_exists(root).await {
        return Err(ProjiError::conflict(format!("project directory {}", root.display())).into());
    }
    ensure_parent_dir(root)?;
    match tokio::fs::create_dir(root).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(ProjiError::conflict(format!("project directory {}", root.display())).into())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to create project directory {}", root.display())),
    }
}

/// Remote templates and plugins must have been given a local path by the resolver.
fn ensure_resolved(package: &Package) -> Result<(), ProjiError> {
    let unresolved_template = package.dir_tree.entries.iter().find(|entry| {
        entry.template.as_ref().is_some_and(|template| {
            template.path.is_empty() && has_upstream(template.upstream_url.as_deref())
        })
    });
    if let Some(entry) = unresolved_template {
        return Err(ProjiError::invalid(format!(
            "template of entry '{}' has not been downloaded yet",
            entry.path
        )));
    }

    let unresolved_plugin = package
        .pre_plugins()
        .iter()
        .chain(package.post_plugins())
        .find(|plugin| plugin.path.is_empty() && has_upstream(plugin.upstream_url.as_deref()));
    if let Some(plugin) = unresolved_plugin {
        return Err(ProjiError::invalid(format!(
            "plugin '{}' has not been downloaded yet",
            plugin.upstream_url.as_deref().unwrap_or_default()
        )));
    }
    Ok(())
}
