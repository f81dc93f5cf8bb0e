//! Persistence for packages and project records.
//!
//! [`PackageStore`] and [`ProjectStore`] are the seams the managers talk to. The only
//! implementation is [`JsonStore`]: an in-memory map guarded by a mutex and, unless
//! created with [`JsonStore::in_memory`], mirrored to a JSON document after every
//! mutation. Documents are written atomically, so a crash leaves either the old or the
//! new state on disk.
//!
//! Store semantics:
//!
//! - `store` fails with [`ProjiError::Conflict`] if the key already exists
//! - `get`, `update` and `remove` fail with [`ProjiError::NotFound`] if it does not
//! - project records are removed softly (`removed_at` is set); `purge` deletes them

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::core::ProjiError;
use crate::models::{Package, ProjectRecord};
use crate::utils::atomic_write;

/// Stored packages, keyed by label.
pub trait PackageStore: Send + Sync {
    /// All packages, ordered by label.
    fn fetch_all(&self) -> Result<Vec<Package>>;
    fn get(&self, label: &str) -> Result<Package>;
    fn store(&self, package: Package) -> Result<()>;
    /// Replace the stored package with the same label.
    fn update(&self, package: Package) -> Result<()>;
    fn remove(&self, label: &str) -> Result<()>;
}

/// Project records, keyed by id.
pub trait ProjectStore: Send + Sync {
    /// Records ordered by path; softly removed ones only when asked for.
    fn fetch_all(&self, include_removed: bool) -> Result<Vec<ProjectRecord>>;
    fn get(&self, id: &str) -> Result<ProjectRecord>;
    /// The live record at `path`.
    fn get_by_path(&self, path: &Path) -> Result<ProjectRecord>;
    /// Fails with a conflict if the id exists or a live record already owns the path.
    fn store(&self, record: ProjectRecord) -> Result<()>;
    fn update(&self, record: ProjectRecord) -> Result<()>;
    /// Mark a record as removed.
    fn remove(&self, id: &str) -> Result<()>;
    /// Delete a record for good.
    fn purge(&self, id: &str) -> Result<()>;
}

/// Records that know their own store key.
pub trait Keyed {
    fn key(&self) -> &str;
    /// Name used in error messages ("package", "project").
    fn kind() -> &'static str;
}

impl Keyed for Package {
    fn key(&self) -> &str {
        &self.label
    }

    fn kind() -> &'static str {
        "package"
    }
}

impl Keyed for ProjectRecord {
    fn key(&self) -> &str {
        &self.id
    }

    fn kind() -> &'static str {
        "project"
    }
}

/// Mutex-guarded map, optionally backed by a JSON file.
#[derive(Debug)]
pub struct JsonStore<T> {
    path: Option<PathBuf>,
    records: Mutex<BTreeMap<String, T>>,
}

impl<T> JsonStore<T>
where
    T: Keyed + Clone + Serialize + DeserializeOwned,
{
    /// Load the document at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                let list: Vec<T> = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse {}", path.display()))?;
                list.into_iter().map(|record| (record.key().to_string(), record)).collect()
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!("opened {} store {} ({} records)", T::kind(), path.display(), records.len());
        Ok(Self {
            path: Some(path),
            records: Mutex::new(records),
        })
    }

    /// Store without a backing file.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, T>>> {
        self.records.lock().map_err(|_| {
            ProjiError::Other {
                message: format!("{} store lock poisoned", T::kind()),
            }
            .into()
        })
    }

    fn persist(&self, records: &BTreeMap<String, T>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let list: Vec<&T> = records.values().collect();
        let content = serde_json::to_vec_pretty(&list)?;
        atomic_write(path, &content)
    }

    /// Apply `change` under the lock and persist the result. The in-memory state only
    /// changes when persisting succeeds.
    fn mutate<R>(&self, change: impl FnOnce(&mut BTreeMap<String, T>) -> Result<R>) -> Result<R> {
        let mut records = self.lock()?;
        let mut next = records.clone();
        let out = change(&mut next)?;
        self.persist(&next)?;
        *records = next;
        Ok(out)
    }

    fn get_record(&self, key: &str) -> Result<T> {
        self.lock()?
            .get(key)
            .cloned()
            .ok_or_else(|| ProjiError::not_found(format!("{} '{key}'", T::kind())).into())
    }

    fn insert(&self, record: T) -> Result<()> {
        self.mutate(|records| {
            let key = record.key().to_string();
            if records.contains_key(&key) {
                return Err(ProjiError::conflict(format!("{} '{key}'", T::kind())).into());
            }
            records.insert(key, record);
            Ok(())
        })
    }

    fn replace(&self, record: T) -> Result<()> {
        self.mutate(|records| {
            let key = record.key().to_string();
            match records.get_mut(&key) {
                Some(existing) => {
                    *existing = record;
                    Ok(())
                }
                None => Err(ProjiError::not_found(format!("{} '{key}'", T::kind())).into()),
            }
        })
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.mutate(|records| {
            records
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| ProjiError::not_found(format!("{} '{key}'", T::kind())).into())
        })
    }
}

impl PackageStore for JsonStore<Package> {
    fn fetch_all(&self) -> Result<Vec<Package>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn get(&self, label: &str) -> Result<Package> {
        self.get_record(label)
    }

    fn store(&self, package: Package) -> Result<()> {
        self.insert(package)
    }

    fn update(&self, package: Package) -> Result<()> {
        self.replace(package)
    }

    fn remove(&self, label: &str) -> Result<()> {
        self.delete(label)
    }
}

impl ProjectStore for JsonStore<ProjectRecord> {
    fn fetch_all(&self, include_removed: bool) -> Result<Vec<ProjectRecord>> {
        let mut records: Vec<ProjectRecord> = self
            .lock()?
            .values()
            .filter(|record| include_removed || record.is_live())
            .cloned()
            .collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(records)
    }

    fn get(&self, id: &str) -> Result<ProjectRecord> {
        self.get_record(id)
    }

    fn get_by_path(&self, path: &Path) -> Result<ProjectRecord> {
        self.lock()?
            .values()
            .find(|record| record.is_live() && record.path == path)
            .cloned()
            .ok_or_else(|| ProjiError::not_found(format!("project at {}", path.display())).into())
    }

    fn store(&self, record: ProjectRecord) -> Result<()> {
        self.mutate(|records| {
            if records.contains_key(&record.id) {
                return Err(ProjiError::conflict(format!("project '{}'", record.id)).into());
            }
            if records.values().any(|other| other.is_live() && other.path == record.path) {
                return Err(
                    ProjiError::conflict(format!("project at {}", record.path.display())).into()
                );
            }
            records.insert(record.id.clone(), record);
            Ok(())
        })
    }

    fn update(&self, record: ProjectRecord) -> Result<()> {
        self.replace(record)
    }

    fn remove(&self, id: &str) -> Result<()> {
        self.mutate(|records| {
            let record = records
                .get_mut(id)
                .filter(|record| record.is_live())
                .ok_or_else(|| ProjiError::not_found(format!("project '{id}'")))?;
            let now = Utc::now();
            record.removed_at = Some(now);
            record.updated_at = now;
            Ok(())
        })
    }

    fn purge(&self, id: &str) -> Result<()> {
        self.delete(id)
    }
}
