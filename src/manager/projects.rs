//! Project bookkeeping.
//!
//! Projects are always recorded locally. Creating one materializes a package and then
//! records where it went; the record is only written once materialization succeeded.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::PackageManager;
use crate::core::{ProjiError, find_error};
use crate::materializer::ProjectMaterializer;
use crate::models::ProjectRecord;
use crate::store::ProjectStore;
use crate::utils::fs::absolute;
use crate::utils::path_exists;

/// Partial update of a project record. `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectUpdate {
    pub id: String,
    pub path: Option<PathBuf>,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Creates projects and manages their records.
#[derive(Clone)]
pub struct ProjectManager {
    store: Arc<dyn ProjectStore>,
}

impl ProjectManager {
    pub fn new(store: Arc<dyn ProjectStore>) -> Self {
        Self {
            store,
        }
    }

    /// Materialize the package `label` at `path` and record the new project.
    ///
    /// # Errors
    ///
    /// [`ProjiError::Conflict`] if a live project already lives at `path` or the directory
    /// exists; otherwise whatever loading or materializing the package fails with.
    pub async fn create(
        &self,
        packages: &dyn PackageManager,
        materializer: &ProjectMaterializer,
        label: &str,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ProjectRecord> {
        let path = absolute(path)?;
        match self.store.get_by_path(&path) {
            Ok(existing) => {
                return Err(ProjiError::conflict(format!(
                    "project '{}' at {}",
                    existing.name,
                    path.display()
                ))
                .into());
            }
            Err(e) if matches!(find_error(&e), Some(ProjiError::NotFound { .. })) => {}
            Err(e) => return Err(e),
        }

        let package = packages
            .get_by_label(label)
            .await
            .with_context(|| format!("Failed to load package '{label}'"))?;
        materializer.materialize(&package, &path, cancel).await?;

        let record = ProjectRecord::new(&path, &package.label);
        self.store.store(record.clone())?;
        tracing::info!("Created project '{}' at {}", record.name, path.display());
        Ok(record)
    }

    /// Project records, optionally including removed ones.
    pub fn fetch(&self, include_removed: bool) -> Result<Vec<ProjectRecord>> {
        self.store.fetch_all(include_removed)
    }

    pub fn get(&self, id: &str) -> Result<ProjectRecord> {
        self.store.get(id)
    }

    /// The live project at `path`, relative paths taken from the current directory.
    pub fn get_by_path(&self, path: &Path) -> Result<ProjectRecord> {
        self.store.get_by_path(&absolute(path)?)
    }

    /// Find a live project by id or by path.
    pub fn find(&self, id_or_path: &str) -> Result<ProjectRecord> {
        match self.store.get(id_or_path) {
            Ok(record) if record.is_live() => Ok(record),
            _ => self.get_by_path(Path::new(id_or_path)),
        }
    }

    pub fn update(&self, update: ProjectUpdate) -> Result<ProjectRecord> {
        let mut record = self.store.get(&update.id)?;
        if let Some(path) = update.path {
            let path = absolute(&path)?;
            let taken = self.store.get_by_path(&path).is_ok_and(|other| other.id != record.id);
            if taken {
                return Err(ProjiError::conflict(format!("project at {}", path.display())).into());
            }
            record.path = path;
        }
        if let Some(name) = update.name {
            record.name = name;
        }
        if update.description.is_some() {
            record.description = update.description;
        }
        record.updated_at = Utc::now();
        self.store.update(record.clone())?;
        Ok(record)
    }

    /// Mark a project as removed. Its files are left alone.
    pub fn remove(&self, id: &str) -> Result<()> {
        self.store.remove(id)
    }

    /// Delete a project record for good. Its files are left alone.
    pub fn purge(&self, id: &str) -> Result<()> {
        self.store.purge(id)
    }

    /// Remove the records of live projects whose directory is gone. Returns them.
    pub async fn clean(&self) -> Result<Vec<ProjectRecord>> {
        let mut cleaned = Vec::new();
        for record in self.store.fetch_all(false)? {
            if path_exists(&record.path).await {
                continue;
            }
            tracing::debug!("project '{}' vanished from {}", record.name, record.path.display());
            self.store.remove(&record.id)?;
            cleaned.push(record);
        }
        Ok(cleaned)
    }
}
