//! Dependency resolution for packages.
//!
//! Templates and plugins may point at files (or, for templates, whole directories) on a
//! source-hosting platform through their upstream URL. Before a package can be stored or
//! materialized those dependencies have to exist in the local cache. The
//! [`DependencyResolver`] walks a package, downloads what is missing and rewrites empty
//! local paths so they point at the cached copies.
//!
//! # Cache layout
//!
//! ```text
//! <templates dir>/<platform>/<owner>/<basename>
//! <plugins dir>/<platform>/<owner>/<basename>
//! ```
//!
//! `basename` is the last segment of the dependency's in-repository path, or the
//! repository name when the URL points at a whole repository.
//!
//! # Behavior
//!
//! - Templates are visited in tree order, then pre plugins, then post plugins.
//! - A destination that already exists is left alone. Nothing in the cache is ever
//!   overwritten.
//! - Files land through temp-file-then-rename; directory templates are assembled in a
//!   temporary sibling directory that is renamed into place once complete.
//! - The first failure aborts the run. Dependencies fetched before it stay cached.
//! - The cancellation token is checked between dependencies and raced against every
//!   request.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::{OrCancel, ProjiError, checkpoint};
use crate::models::{Package, has_upstream};
use crate::platform::{Platform, PlatformRegistry, RepoLocation};
use crate::utils::{atomic_write, ensure_dir, ensure_parent_dir, path_exists};

/// What a resolver run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Destinations downloaded during this run
    pub fetched: Vec<PathBuf>,
    /// Destinations that were already cached and left untouched
    pub cached: Vec<PathBuf>,
}

impl Resolution {
    /// Number of dependencies visited.
    #[must_use]
    pub fn total(&self) -> usize {
        self.fetched.len() + self.cached.len()
    }

    /// Whether the package had no remote dependencies at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DependencyKind {
    Template { is_file: bool },
    Plugin,
}

impl DependencyKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Template { .. } => "template",
            Self::Plugin => "plugin",
        }
    }
}

/// Downloads remote templates and plugins into the local cache.
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    platforms: PlatformRegistry,
    templates_dir: PathBuf,
    plugins_dir: PathBuf,
}

impl DependencyResolver {
    pub fn new(
        platforms: PlatformRegistry,
        templates_dir: impl Into<PathBuf>,
        plugins_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            platforms,
            templates_dir: templates_dir.into(),
            plugins_dir: plugins_dir.into(),
        }
    }

    /// Resolver using the configured cache directories and credentials.
    pub fn from_config(config: &Config) -> Result<Self> {
        let platforms = PlatformRegistry::new(&config.effective_auth())?;
        Ok(Self::new(platforms, config.templates_dir()?, config.plugins_dir()?))
    }

    /// Platforms used for downloads.
    #[must_use]
    pub fn platforms(&self) -> &PlatformRegistry {
        &self.platforms
    }

    #[must_use]
    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    #[must_use]
    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// Make every remote dependency of `package` available locally.
    ///
    /// Templates and plugins with an empty `path` get it set to their cache-relative
    /// destination so the materializer can find them.
    ///
    /// # Errors
    ///
    /// The first failing dependency aborts the run with an error naming it. Root causes
    /// come from the platform layer (`InvalidUrl`, `UnsupportedPlatform`, `NotFound`,
    /// `RateLimited`, `Transport`), from the filesystem, or `Cancelled`.
    pub async fn resolve(
        &self,
        package: &mut Package,
        cancel: &CancellationToken,
    ) -> Result<Resolution> {
        let mut resolution = Resolution::default();

        for entry in &mut package.dir_tree.entries {
            let Some(template) = entry.template.as_mut() else {
                continue;
            };
            let Some(upstream) =
                template.upstream_url.clone().filter(|url| has_upstream(Some(url.as_str())))
            else {
                continue;
            };

            checkpoint(cancel, "dependency resolution")?;
            let kind = DependencyKind::Template {
                is_file: template.is_file,
            };
            let relative = self
                .resolve_one(kind, &upstream, cancel, &mut resolution)
                .await
                .with_context(|| format!("Failed to download template '{upstream}' for '{}'", entry.path))?;
            if template.path.is_empty() {
                template.path = relative;
            }
        }

        if let Some(schedule) = package.plugins.as_mut() {
            for plugin in schedule.pre.iter_mut().chain(schedule.post.iter_mut()) {
                let Some(upstream) =
                    plugin.upstream_url.clone().filter(|url| has_upstream(Some(url.as_str())))
                else {
                    continue;
                };

                checkpoint(cancel, "dependency resolution")?;
                let relative = self
                    .resolve_one(DependencyKind::Plugin, &upstream, cancel, &mut resolution)
                    .await
                    .with_context(|| format!("Failed to download plugin '{upstream}'"))?;
                if plugin.path.is_empty() {
                    plugin.path = relative;
                }
            }
        }

        tracing::debug!(
            "resolved {} dependencies of '{}' ({} fetched, {} cached)",
            resolution.total(),
            package.label,
            resolution.fetched.len(),
            resolution.cached.len()
        );
        Ok(resolution)
    }

    /// Fetch one dependency unless cached. Returns the cache-relative destination.
    async fn resolve_one(
        &self,
        kind: DependencyKind,
        upstream: &str,
        cancel: &CancellationToken,
        resolution: &mut Resolution,
    ) -> Result<String> {
        let (platform, location) = self.platforms.locate(upstream)?;

        let basename = location
            .path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(location.repo.name.as_str())
            .to_string();
        let relative = format!("{}/{}/{basename}", platform.name(), location.repo.owner);

        let cache_root = match kind {
            DependencyKind::Template { .. } => &self.templates_dir,
            DependencyKind::Plugin => &self.plugins_dir,
        };
        let destination = cache_root.join(platform.name()).join(&location.repo.owner).join(&basename);

        if path_exists(&destination).await {
            tracing::debug!("{} {} already cached at {}", kind.label(), upstream, destination.display());
            resolution.cached.push(destination);
            return Ok(relative);
        }

        tracing::info!("Downloading {} {}", kind.label(), upstream);
        match kind {
            DependencyKind::Template { is_file: false } => {
                self.download_dir(platform.as_ref(), &location, &destination, cancel).await?;
            }
            _ => {
                self.download_file(platform.as_ref(), &location, &destination, cancel).await?;
            }
        }

        resolution.fetched.push(destination);
        Ok(relative)
    }

    async fn download_file(
        &self,
        platform: &dyn Platform,
        location: &RepoLocation,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if location.path.is_empty() {
            return Err(ProjiError::invalid(format!(
                "'{}' names a repository, not a file",
                location.repo
            ))
            .into());
        }

        let content = platform
            .fetch_file_content(&location.repo, &location.path)
            .or_cancel(cancel, "file download")
            .await??;
        atomic_write(destination, &content.bytes)?;
        tracing::debug!("wrote {} ({} bytes, sha {})", destination.display(), content.bytes.len(), content.sha);
        Ok(())
    }

    async fn download_dir(
        &self,
        platform: &dyn Platform,
        location: &RepoLocation,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let prefix = location.path.trim_matches('/');
        let skip = |path: &str| outside_prefix(prefix, path);
        let tree = platform
            .list_tree(&location.repo, &skip)
            .or_cancel(cancel, "tree listing")
            .await??;

        let children: Vec<(&str, bool)> = tree
            .entries
            .iter()
            .filter_map(|entry| relative_to(prefix, &entry.path).map(|rel| (rel, entry.is_dir)))
            .collect();
        let prefix_listed = prefix.is_empty() || tree.entries.iter().any(|entry| entry.path == prefix);
        if !prefix_listed && children.is_empty() {
            return Err(ProjiError::not_found(format!(
                "directory '{prefix}' in {}",
                location.repo
            ))
            .into());
        }

        ensure_parent_dir(destination)?;
        let parent = destination.parent().unwrap_or_else(|| Path::new("."));
        let staging = tempfile::Builder::new()
            .prefix(".proji-")
            .tempdir_in(parent)
            .with_context(|| format!("Failed to create staging directory in {}", parent.display()))?;

        for (rel, is_dir) in children {
            checkpoint(cancel, "directory download")?;
            let target = staging.path().join(rel);
            if is_dir {
                ensure_dir(&target)?;
                continue;
            }

            let path = if prefix.is_empty() {
                rel.to_string()
            } else {
                format!("{prefix}/{rel}")
            };
            let content = platform
                .fetch_file_content(&location.repo, &path)
                .or_cancel(cancel, "file download")
                .await??;
            atomic_write(&target, &content.bytes)?;
        }

        std::fs::rename(staging.path(), destination).with_context(|| {
            format!("Failed to move downloaded directory into {}", destination.display())
        })?;
        Ok(())
    }
}

/// Skip predicate for a directory download rooted at `prefix`. Ancestors of the prefix are
/// kept so the listing can descend into it.
fn outside_prefix(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    let inside = relative_to(prefix, path).is_some() || path == prefix;
    let ancestor = prefix.strip_prefix(path).is_some_and(|rest| rest.starts_with('/'));
    !(inside || ancestor)
}

/// `path` relative to `prefix`, for paths strictly below it.
fn relative_to<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path).filter(|path| !path.is_empty());
    }
    path.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
}
