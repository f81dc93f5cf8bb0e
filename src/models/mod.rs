//! Shared data models for proji.
//!
//! A [`Package`] describes how to scaffold a project: an ordered [`DirTree`] of files and
//! directories (optionally filled from a [`Template`]) plus a [`PluginSchedule`] of scripts
//! that run before and after the tree is built. A [`ProjectRecord`] remembers where a
//! package was materialized.
//!
//! Templates and plugins may carry an upstream URL. Those have to be downloaded into the
//! local cache by the [`crate::resolver::DependencyResolver`] before a package can be
//! materialized.
//!
//! All types serialize with serde; see [`crate::portability`] for the TOML and JSON
//! encodings.

pub mod label;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::constants::MAX_LABEL_LEN;
use crate::core::ProjiError;

pub use label::generate_label;

/// A reusable project skeleton.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Short unique identifier. Immutable once stored.
    pub label: String,
    /// Human-readable name
    pub name: String,
    /// Where the package definition came from, if anywhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_url: Option<String>,
    /// Content hash of the upstream revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Files and directories to create, in order
    #[serde(default)]
    pub dir_tree: DirTree,
    /// Scripts run around tree construction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins: Option<PluginSchedule>,
}

/// Ordered sequence of directory entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirTree {
    #[serde(default, alias = "entry")]
    pub entries: Vec<DirEntry>,
}

/// One file or directory of a package's tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Path relative to the project root
    pub path: String,
    pub is_dir: bool,
    /// Content source; without one an empty file or directory is created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Template>,
}

/// A file or directory copied into a project from the template cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Source path, relative to the template cache root (or absolute)
    #[serde(default)]
    pub path: String,
    /// Target path relative to the project root. Empty means "the entry's path".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination: String,
    pub is_file: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An executable script run during materialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    /// Script path, relative to the plugin cache root (or absolute)
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Plugins split by phase. List order is execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSchedule {
    /// Run after the project root is created and before the tree is built
    #[serde(default)]
    pub pre: Vec<Plugin>,
    /// Run after the tree is built
    #[serde(default)]
    pub post: Vec<Plugin>,
}

/// Which side of tree construction a plugin runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Pre,
    Post,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => f.write_str("pre"),
            Self::Post => f.write_str("post"),
        }
    }
}

/// Partial update of a stored package. `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageUpdate {
    /// Identifies the package; never changed by an update
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir_tree: Option<DirTree>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins: Option<PluginSchedule>,
}

impl PackageUpdate {
    /// An update that touches nothing.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

impl From<Package> for PackageUpdate {
    fn from(package: Package) -> Self {
        Self {
            label: package.label,
            name: Some(package.name),
            upstream_url: package.upstream_url,
            sha: package.sha,
            description: package.description,
            dir_tree: Some(package.dir_tree),
            plugins: package.plugins,
        }
    }
}

impl Package {
    /// Create an empty package.
    pub fn new(label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create an empty package whose label is derived from its name.
    pub fn with_generated_label(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(generate_label(&name), name)
    }

    /// Pre-phase plugins, empty when the package has no schedule.
    #[must_use]
    pub fn pre_plugins(&self) -> &[Plugin] {
        self.plugins.as_ref().map_or(&[], |schedule| schedule.pre.as_slice())
    }

    /// Post-phase plugins, empty when the package has no schedule.
    #[must_use]
    pub fn post_plugins(&self) -> &[Plugin] {
        self.plugins.as_ref().map_or(&[], |schedule| schedule.post.as_slice())
    }

    /// Whether any template or plugin still points at an upstream URL.
    #[must_use]
    pub fn has_remote_dependencies(&self) -> bool {
        let templates = self
            .dir_tree
            .entries
            .iter()
            .filter_map(|entry| entry.template.as_ref())
            .any(|template| has_upstream(template.upstream_url.as_deref()));
        let plugins = self
            .pre_plugins()
            .iter()
            .chain(self.post_plugins())
            .any(|plugin| has_upstream(plugin.upstream_url.as_deref()));
        templates || plugins
    }

    /// Merge an update into this package. The label is left untouched.
    pub fn apply_update(&mut self, update: PackageUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if update.upstream_url.is_some() {
            self.upstream_url = update.upstream_url;
        }
        if update.sha.is_some() {
            self.sha = update.sha;
        }
        if update.description.is_some() {
            self.description = update.description;
        }
        if let Some(dir_tree) = update.dir_tree {
            self.dir_tree = dir_tree;
        }
        if update.plugins.is_some() {
            self.plugins = update.plugins;
        }
    }

    /// Check the structural rules every stored package must satisfy.
    ///
    /// # Errors
    ///
    /// Returns [`ProjiError::InvalidInput`] for an empty or malformed label, an empty
    /// name, duplicate entry paths, paths escaping the project root, or templates and
    /// plugins that name neither a local path nor an upstream URL.
    pub fn validate(&self) -> Result<(), ProjiError> {
        validate_label(&self.label)?;
        if self.name.trim().is_empty() {
            return Err(ProjiError::invalid(format!("package '{}' has an empty name", self.label)));
        }

        let mut seen = HashSet::new();
        for entry in &self.dir_tree.entries {
            check_relative(&entry.path, "entry path")?;
            if !seen.insert(entry.path.as_str()) {
                return Err(ProjiError::invalid(format!(
                    "duplicate entry path '{}' in package '{}'",
                    entry.path, self.label
                )));
            }

            if let Some(template) = &entry.template {
                if template.path.is_empty() && !has_upstream(template.upstream_url.as_deref()) {
                    return Err(ProjiError::invalid(format!(
                        "template of entry '{}' has neither a path nor an upstream URL",
                        entry.path
                    )));
                }
                if !template.destination.is_empty() {
                    check_relative(&template.destination, "template destination")?;
                }
            }
        }

        for plugin in self.pre_plugins().iter().chain(self.post_plugins()) {
            if plugin.path.is_empty() && !has_upstream(plugin.upstream_url.as_deref()) {
                return Err(ProjiError::invalid(format!(
                    "a plugin of package '{}' has neither a path nor an upstream URL",
                    self.label
                )));
            }
        }

        Ok(())
    }
}

pub(crate) fn has_upstream(url: Option<&str>) -> bool {
    url.is_some_and(|url| !url.trim().is_empty())
}

/// Labels are short, non-empty and free of whitespace and path separators.
pub fn validate_label(label: &str) -> Result<(), ProjiError> {
    if label.is_empty() {
        return Err(ProjiError::invalid("package label must not be empty"));
    }
    if label.chars().count() > MAX_LABEL_LEN {
        return Err(ProjiError::invalid(format!(
            "package label '{label}' is longer than {MAX_LABEL_LEN} characters"
        )));
    }
    if label.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\') {
        return Err(ProjiError::invalid(format!(
            "package label '{label}' must not contain whitespace or path separators"
        )));
    }
    Ok(())
}

fn check_relative(path: &str, what: &str) -> Result<(), ProjiError> {
    if path.trim().is_empty() {
        return Err(ProjiError::invalid(format!("{what} must not be empty")));
    }
    let escapes = Path::new(path).components().any(|component| {
        matches!(component, Component::ParentDir | Component::RootDir | Component::Prefix(_))
    });
    if escapes {
        return Err(ProjiError::invalid(format!(
            "{what} '{path}' must be relative and stay inside the project"
        )));
    }
    Ok(())
}

/// A project that was materialized from a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// Random identifier
    pub id: String,
    /// Absolute project root
    pub path: PathBuf,
    pub name: String,
    /// Label of the package the project was created from
    pub package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the record was soft-removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_at: Option<DateTime<Utc>>,
}

impl ProjectRecord {
    /// Create a live record with a fresh id, named after the final path component.
    pub fn new(path: impl Into<PathBuf>, package: impl Into<String>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            path,
            name,
            package: package.into(),
            description: None,
            created_at: now,
            updated_at: now,
            removed_at: None,
        }
    }

    /// Records that were not soft-removed.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.removed_at.is_none()
    }
}
