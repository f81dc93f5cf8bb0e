//! Package import and export.
//!
//! Packages travel as config files in one of two encodings, picked by file extension:
//!
//! - **TOML** (`.toml`): the human-editable form
//! - **JSON** (`.json`): the compact machine form
//!
//! Both carry the complete [`Package`], so decoding an encoded package gives it back
//! unchanged.
//!
//! Besides config files, packages can be derived from a local folder (its layout becomes
//! the directory tree) or from a remote repository tree. The configured exclude pattern
//! drops matching paths, and everything below a dropped directory.
//!
//! # Example
//!
//! ```toml
//! label = "rs"
//! name = "Rust Service"
//!
//! [[dir_tree.entries]]
//! path = "src"
//! is_dir = true
//!
//! [[dir_tree.entries]]
//! path = "src/main.rs"
//! is_dir = false
//!
//! [dir_tree.entries.template]
//! path = "rust/main.rs"
//! is_file = true
//!
//! [[plugins.post]]
//! path = "git-init.sh"
//! ```

use anyhow::{Context, Result};
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::constants::EXPORT_FILE_PREFIX;
use crate::core::{OrCancel, ProjiError};
use crate::models::{DirEntry, Package, has_upstream};
use crate::platform::{PlatformRegistry, parse_repo_url};
use crate::utils::fs::{absolute, sha256_hex};
use crate::utils::{atomic_write, path_exists};

/// Encoding of a package config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    #[default]
    Toml,
    Json,
}

impl ConfigFormat {
    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }

    /// Format named by a path's extension.
    ///
    /// # Errors
    ///
    /// [`ProjiError::InvalidInput`] for anything but `.toml` and `.json`.
    pub fn from_path(path: &Path) -> Result<Self, ProjiError> {
        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
        extension.parse().map_err(|_| {
            ProjiError::invalid(format!(
                "unsupported config file type '{}' (expected .toml or .json)",
                path.display()
            ))
        })
    }
}

impl FromStr for ConfigFormat {
    type Err = ProjiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            other => Err(ProjiError::invalid(format!("unsupported config format '{other}'"))),
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Serialize a package.
pub fn encode(package: &Package, format: ConfigFormat) -> Result<String> {
    Ok(match format {
        ConfigFormat::Toml => toml::to_string_pretty(package).map_err(ProjiError::from)?,
        ConfigFormat::Json => serde_json::to_string_pretty(package).map_err(ProjiError::from)?,
    })
}

/// Deserialize a package.
pub fn decode(content: &str, format: ConfigFormat) -> Result<Package> {
    Ok(match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(ProjiError::from)?,
        ConfigFormat::Json => serde_json::from_str(content).map_err(ProjiError::from)?,
    })
}

/// Read a package from a local config file.
///
/// A package without a hash gets the SHA-256 of the file.
pub async fn import_config_file(path: &Path) -> Result<Package> {
    let format = ConfigFormat::from_path(path)?;
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read package config {}", path.display()))?;
    let text = String::from_utf8(content)
        .map_err(|_| ProjiError::invalid(format!("{} is not valid UTF-8", path.display())))?;

    let mut package = decode(&text, format)
        .with_context(|| format!("Failed to parse package config {}", path.display()))?;
    if !has_upstream(package.sha.as_deref()) {
        package.sha = Some(sha256_hex(text.as_bytes()));
    }

    tracing::debug!("imported package '{}' from {}", package.label, path.display());
    Ok(package)
}

/// Turn a local folder's layout into a package.
///
/// Paths are relative to `dir` with `/` separators, in file name order. Entries whose
/// relative path matches `exclude` are dropped; for directories the whole subtree goes.
/// The label is generated from the folder name.
pub fn import_folder(dir: &Path, exclude: Option<&Regex>) -> Result<Package> {
    let dir = absolute(dir)?;
    if !dir.is_dir() {
        return Err(ProjiError::invalid(format!("{} is not a directory", dir.display())).into());
    }
    let name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| ProjiError::invalid(format!("cannot derive a name from {}", dir.display())))?;

    let exclude = exclude.filter(|regex| !regex.as_str().is_empty());
    let relative = |path: &Path| -> Option<String> {
        let rel = path.strip_prefix(&dir).ok()?;
        let parts: Vec<String> =
            rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
        Some(parts.join("/"))
    };

    let mut package = Package::with_generated_label(name);
    let walker = WalkDir::new(&dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let Some(rel) = relative(entry.path()) else {
                return false;
            };
            !exclude.is_some_and(|regex| regex.is_match(&rel))
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        let Some(path) = relative(entry.path()) else {
            continue;
        };
        package.dir_tree.entries.push(DirEntry {
            path,
            is_dir: entry.file_type().is_dir(),
            template: None,
        });
    }

    tracing::debug!(
        "imported folder {} as '{}' ({} entries)",
        dir.display(),
        package.label,
        package.dir_tree.entries.len()
    );
    Ok(package)
}

/// Fetch and decode a package config hosted on a platform.
///
/// The format follows the file extension and defaults to TOML. The package's upstream URL
/// and hash default to the normalized file URL and the platform's content hash.
pub async fn import_remote_config(
    platforms: &PlatformRegistry,
    url: &str,
    cancel: &CancellationToken,
) -> Result<Package> {
    let normalized = parse_repo_url(url)?;
    let (platform, location) = platforms.locate(url)?;
    if location.path.is_empty() {
        return Err(ProjiError::invalid(format!("'{url}' does not point at a config file")).into());
    }

    let content = platform
        .fetch_file_content(&location.repo, &location.path)
        .or_cancel(cancel, "package config download")
        .await?
        .with_context(|| format!("Failed to download package config {url}"))?;

    let format = ConfigFormat::from_path(Path::new(&location.path)).unwrap_or_default();
    let text = String::from_utf8(content.bytes)
        .map_err(|_| ProjiError::invalid(format!("'{url}' is not valid UTF-8")))?;
    let mut package =
        decode(&text, format).with_context(|| format!("Failed to parse package config {url}"))?;

    if !has_upstream(package.upstream_url.as_deref()) {
        package.upstream_url = Some(normalized.to_string());
    }
    if !has_upstream(package.sha.as_deref()) {
        package.sha = Some(content.sha);
    }
    Ok(package)
}

/// Turn a remote repository tree into a package.
///
/// When the URL points into a subdirectory, only that subtree is imported and paths are
/// relative to it. The label is generated from the repository name.
pub async fn import_repository(
    platforms: &PlatformRegistry,
    url: &str,
    exclude: Option<&Regex>,
    cancel: &CancellationToken,
) -> Result<Package> {
    let normalized = parse_repo_url(url)?;
    let (platform, location) = platforms.locate(url)?;
    let prefix = location.path.trim_matches('/').to_string();
    let exclude = exclude.filter(|regex| !regex.as_str().is_empty());

    let skip = |path: &str| {
        let outside = !prefix.is_empty()
            && path != prefix
            && !path.starts_with(&format!("{prefix}/"))
            && !prefix.starts_with(&format!("{path}/"));
        outside || exclude.is_some_and(|regex| regex.is_match(path))
    };
    let tree = platform
        .list_tree(&location.repo, &skip)
        .or_cancel(cancel, "repository listing")
        .await?
        .with_context(|| format!("Failed to list repository {url}"))?;

    let mut package = Package::with_generated_label(location.repo.name.clone());
    package.upstream_url = Some(normalized.to_string());
    package.sha = tree.sha;
    package.dir_tree.entries = tree
        .entries
        .into_iter()
        .filter_map(|mut entry| {
            if prefix.is_empty() {
                return Some(entry);
            }
            let rel = entry.path.strip_prefix(&prefix)?.strip_prefix('/')?.to_string();
            entry.path = rel;
            Some(entry)
        })
        .collect();

    tracing::debug!(
        "imported repository {} as '{}' ({} entries)",
        location.repo,
        package.label,
        package.dir_tree.entries.len()
    );
    Ok(package)
}

/// Write `package` to `<dir>/proji-<label>.<ext>`.
///
/// # Errors
///
/// [`ProjiError::Conflict`] if the file exists.
pub async fn export_config_file(package: &Package, dir: &Path, format: ConfigFormat) -> Result<PathBuf> {
    let path = dir.join(format!("{EXPORT_FILE_PREFIX}{}.{}", package.label, format.extension()));
    if path_exists(&path).await {
        return Err(ProjiError::conflict(format!("export file {}", path.display())).into());
    }

    let content = encode(package, format)?;
    atomic_write(&path, content.as_bytes())?;
    tracing::debug!("exported '{}' to {}", package.label, path.display());
    Ok(path)
}
