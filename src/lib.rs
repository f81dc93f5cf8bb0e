//! proji: create projects from reusable packages.
//!
//! A package describes a project skeleton: an ordered list of directories and files,
//! template files copied into place, and plugin scripts run before and after the tree
//! is built. Templates and plugins may live on GitHub or GitLab; they are downloaded
//! into a local cache when the package is stored, so creating a project works offline.
//!
//! # Architecture Overview
//!
//! ```text
//! platform ──► resolver ──► manager (local) ──► store
//!                              │
//!                              └──► materializer ──► project on disk
//! ```
//!
//! - [`platform`] - GitHub and GitLab clients behind one trait, plus URL parsing
//! - [`resolver`] - downloads remote templates and plugins into the local cache
//! - [`materializer`] - builds a project directory from a resolved package
//! - [`manager`] - local and remote package managers, and project bookkeeping
//! - [`store`] - JSON-file-backed package and project stores
//! - [`portability`] - package config files (TOML, JSON), folder and repository import
//! - [`models`] - packages, templates, plugins and project records
//! - [`config`] - the global configuration file
//! - [`core`] - error types and cancellation helpers
//! - [`cli`] - the `proji` command line
//!
//! # Example
//!
//! ```rust,no_run
//! use proji_cli::config::Config;
//! use proji_cli::manager::{self, ProjectManager};
//! use proji_cli::materializer::ProjectMaterializer;
//! use proji_cli::models::ProjectRecord;
//! use proji_cli::store::JsonStore;
//! use std::path::Path;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load(None).await?;
//! let packages = manager::from_config(&config)?;
//! let projects =
//!     ProjectManager::new(Arc::new(JsonStore::<ProjectRecord>::open(config.projects_file()?)?));
//! let materializer = ProjectMaterializer::from_config(&config)?;
//!
//! let cancel = CancellationToken::new();
//! projects.create(packages.as_ref(), &materializer, "go", Path::new("./svc"), &cancel).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod manager;
pub mod materializer;
pub mod models;
pub mod platform;
pub mod portability;
pub mod resolver;
pub mod store;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
