//! User configuration for proji.
//!
//! The configuration lives in a TOML file at `<config dir>/proji/config.toml`
//! (`~/.config/proji/config.toml` on Linux), or wherever `PROJI_CONFIG` or `--config`
//! points. Every section is optional; a missing file means defaults.
//!
//! ```toml
//! [auth]
//! github_token = "ghp_..."
//! gitlab_token = "glpat-..."
//!
//! [paths]
//! base = "~/.local/share/proji"
//!
//! [import]
//! exclude = "^(.git|.env|.idea|.vscode)$"
//!
//! [server]
//! url = "https://packages.example.com"
//! ```
//!
//! Tokens from `PROJI_GITHUB_TOKEN` and `PROJI_GITLAB_TOKEN` override the file. When
//! `server.url` is set, package operations go to that endpoint instead of the local store.
//!
//! The file is written with `0600` permissions on Unix since it may hold tokens.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::constants::{
    APP_DIR_NAME, CONFIG_FILE_NAME, CONFIG_PATH_ENV, DATA_DIR, DEFAULT_EXCLUDE_PATTERN,
    GITHUB_TOKEN_ENV, GITLAB_TOKEN_ENV, PACKAGES_FILE, PLUGINS_DIR, PROJECTS_FILE,
    TEMPLATES_DIR,
};
use crate::core::ProjiError;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Auth::is_empty")]
    pub auth: Auth,

    #[serde(default, skip_serializing_if = "PathsConfig::is_default")]
    pub paths: PathsConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default, skip_serializing_if = "ServerConfig::is_default")]
    pub server: ServerConfig,

    /// File this configuration was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Optional platform credentials. Absence means anonymous access.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitlab_token: Option<String>,
}

impl Auth {
    fn is_empty(&self) -> bool {
        self.github_token.is_none() && self.gitlab_token.is_none()
    }

    /// Overlay tokens from the environment (as provided by `lookup`) on top of `self`.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |value: Option<String>| value.filter(|token| !token.trim().is_empty());
        if let Some(token) = non_empty(lookup(GITHUB_TOKEN_ENV)) {
            self.github_token = Some(token);
        }
        if let Some(token) = non_empty(lookup(GITLAB_TOKEN_ENV)) {
            self.gitlab_token = Some(token);
        }
        self
    }
}

/// Where cached templates, plugins and the stores live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory; defaults to the directory holding the config file. `~` is expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
}

impl PathsConfig {
    fn is_default(&self) -> bool {
        self.base.is_none()
    }
}

/// Settings for package import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Regex matched against entry names; matching directories are skipped with their subtree
    #[serde(default = "default_exclude")]
    pub exclude: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            exclude: default_exclude(),
        }
    }
}

fn default_exclude() -> String {
    DEFAULT_EXCLUDE_PATTERN.to_string()
}

/// Remote package endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ServerConfig {
    fn is_default(&self) -> bool {
        self.url.is_none()
    }
}

impl Config {
    /// Default location: `$PROJI_CONFIG`, else `<config dir>/proji/config.toml`.
    ///
    /// # Errors
    ///
    /// Fails when the platform has no config directory.
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine configuration directory"))?;
        Ok(config_dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, or from [`Config::default_path`] when `None`.
    ///
    /// A missing file yields the defaults, remembering where the file would live.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("no configuration at {}, using defaults", path.display());
            Ok(Self {
                source: Some(path),
                ..Self::default()
            })
        }
    }

    /// Load and validate a configuration file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ProjiError::ConfigError {
            message: format!("{}: {e}", path.display()),
        })?;
        config.source = Some(path.to_path_buf());
        config.exclude_regex()?;

        tracing::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write the configuration as TOML with owner-only permissions.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write configuration to {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(path)
                .await
                .with_context(|| format!("Failed to read permissions for {}", path.display()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms).await.with_context(|| {
                format!("Failed to set secure permissions on {}", path.display())
            })?;
        }

        Ok(())
    }

    /// Create the templates, plugins and data directories, and write a default
    /// configuration file if none exists yet.
    pub async fn setup_infrastructure(&self) -> Result<()> {
        for dir in [self.templates_dir()?, self.plugins_dir()?, self.data_dir()?] {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        let path = match &self.source {
            Some(path) => path.clone(),
            None => Self::default_path()?,
        };
        if !path.exists() {
            self.save_to(&path).await?;
            tracing::info!("wrote default configuration to {}", path.display());
        }
        Ok(())
    }

    /// Base directory for caches and stores.
    pub fn base_dir(&self) -> Result<PathBuf> {
        if let Some(base) = &self.paths.base {
            let expanded = shellexpand::full(base).map_err(|e| ProjiError::ConfigError {
                message: format!("cannot expand paths.base '{base}': {e}"),
            })?;
            return Ok(PathBuf::from(expanded.as_ref()));
        }
        match self.source.as_ref().and_then(|source| source.parent()) {
            Some(parent) if !parent.as_os_str().is_empty() => Ok(parent.to_path_buf()),
            _ => Ok(Self::default_path()?
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))),
        }
    }

    /// Template cache root.
    pub fn templates_dir(&self) -> Result<PathBuf> {
        Ok(self.base_dir()?.join(TEMPLATES_DIR))
    }

    /// Plugin cache root.
    pub fn plugins_dir(&self) -> Result<PathBuf> {
        Ok(self.base_dir()?.join(PLUGINS_DIR))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        Ok(self.base_dir()?.join(DATA_DIR))
    }

    pub fn packages_file(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(PACKAGES_FILE))
    }

    pub fn projects_file(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(PROJECTS_FILE))
    }

    /// Credentials from the file, overridden by the process environment.
    #[must_use]
    pub fn effective_auth(&self) -> Auth {
        self.auth.clone().with_overrides(|key| std::env::var(key).ok())
    }

    /// Compile the import exclude pattern.
    pub fn exclude_regex(&self) -> Result<Regex> {
        Regex::new(&self.import.exclude).map_err(|e| {
            ProjiError::ConfigError {
                message: format!("invalid import.exclude pattern '{}': {e}", self.import.exclude),
            }
            .into()
        })
    }
}
