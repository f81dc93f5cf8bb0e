//! Package manager backed by a local store.

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::PackageManager;
use crate::core::ProjiError;
use crate::models::{Package, PackageUpdate, has_upstream};
use crate::portability::{self, ConfigFormat};
use crate::resolver::DependencyResolver;
use crate::store::PackageStore;

/// Stores packages locally after downloading their remote dependencies.
pub struct LocalPackageManager {
    store: Arc<dyn PackageStore>,
    resolver: DependencyResolver,
    exclude: Option<Regex>,
}

impl LocalPackageManager {
    pub fn new(store: Arc<dyn PackageStore>, resolver: DependencyResolver) -> Self {
        Self {
            store,
            resolver,
            exclude: None,
        }
    }

    /// Pattern of repository paths left out when refreshing from a repository.
    #[must_use]
    pub fn with_exclude(mut self, exclude: Option<Regex>) -> Self {
        self.exclude = exclude;
        self
    }

    #[must_use]
    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    async fn store_package(&self, mut package: Package, cancel: &CancellationToken) -> Result<Package> {
        package.validate()?;
        if self.store.get(&package.label).is_ok() {
            return Err(ProjiError::conflict(format!("package '{}'", package.label)).into());
        }

        self.resolver
            .resolve(&mut package, cancel)
            .await
            .with_context(|| format!("Failed to download dependencies of '{}'", package.label))?;
        self.store.store(package.clone())?;
        tracing::info!("Stored package '{}'", package.label);
        Ok(package)
    }

    async fn update_package(&self, update: PackageUpdate, cancel: &CancellationToken) -> Result<Package> {
        let mut package = self.store.get(&update.label)?;
        package.apply_update(update);
        package.validate()?;

        self.resolver
            .resolve(&mut package, cancel)
            .await
            .with_context(|| format!("Failed to download dependencies of '{}'", package.label))?;
        self.store.update(package.clone())?;
        Ok(package)
    }

    async fn refresh_package(&self, label: &str, cancel: &CancellationToken) -> Result<Package> {
        let current = self.store.get(label)?;
        let upstream = current
            .upstream_url
            .clone()
            .filter(|url| has_upstream(Some(url.as_str())))
            .ok_or_else(|| ProjiError::invalid(format!("package '{label}' has no upstream URL")))?;

        tracing::info!("Refreshing '{label}' from {upstream}");
        let platforms = self.resolver.platforms();
        let mut fresh = if points_at_config(&upstream) {
            portability::import_remote_config(platforms, &upstream, cancel).await?
        } else {
            let mut imported =
                portability::import_repository(platforms, &upstream, self.exclude.as_ref(), cancel)
                    .await?;
            imported.name = current.name.clone();
            imported.description = current.description.clone();
            imported.plugins = current.plugins.clone();
            imported
        };

        if fresh.sha.is_some() && fresh.sha == current.sha {
            tracing::info!("'{label}' is up to date");
            return Ok(current);
        }
        fresh.label = current.label;
        fresh.validate()?;
        self.resolver
            .resolve(&mut fresh, cancel)
            .await
            .with_context(|| format!("Failed to download dependencies of '{label}'"))?;
        self.store.update(fresh.clone())?;
        Ok(fresh)
    }
}

fn points_at_config(url: &str) -> bool {
    ConfigFormat::from_path(Path::new(url.trim_end_matches('/'))).is_ok()
}

impl PackageManager for LocalPackageManager {
    fn name(&self) -> &'static str {
        "local"
    }

    fn fetch(&self) -> BoxFuture<'_, Result<Vec<Package>>> {
        Box::pin(async move { self.store.fetch_all() })
    }

    fn get_by_label<'a>(&'a self, label: &'a str) -> BoxFuture<'a, Result<Package>> {
        Box::pin(async move { self.store.get(label) })
    }

    fn store<'a>(
        &'a self,
        package: Package,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Package>> {
        Box::pin(self.store_package(package, cancel))
    }

    fn update<'a>(
        &'a self,
        update: PackageUpdate,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Package>> {
        Box::pin(self.update_package(update, cancel))
    }

    fn remove<'a>(&'a self, label: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.store.remove(label)?;
            tracing::info!("Removed package '{label}'");
            Ok(())
        })
    }

    fn refresh<'a>(
        &'a self,
        label: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Package>> {
        Box::pin(self.refresh_package(label, cancel))
    }
}
