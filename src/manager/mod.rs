//! Package and project management.
//!
//! [`PackageManager`] is the one interface callers use for packages. Two implementations
//! exist:
//!
//! - [`LocalPackageManager`] keeps packages in a local [`PackageStore`] and downloads
//!   their remote dependencies before storing them
//! - [`RemotePackageManager`] forwards every operation to a proji server over HTTP
//!
//! [`from_config`] picks one when the application starts: a configured `server.url`
//! selects the remote manager. Projects are always local; see [`ProjectManager`].

pub mod local;
pub mod projects;
pub mod remote;

use anyhow::Result;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::ProjiError;
use crate::models::{Package, PackageUpdate};
use crate::resolver::DependencyResolver;
use crate::store::JsonStore;

pub use local::LocalPackageManager;
pub use projects::{ProjectManager, ProjectUpdate};
pub use remote::RemotePackageManager;

/// Package operations, independent of where packages live.
pub trait PackageManager: Send + Sync {
    /// Identity of the implementation ("local" or "remote").
    fn name(&self) -> &'static str;

    /// All packages.
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<Package>>>;

    fn get_by_label<'a>(&'a self, label: &'a str) -> BoxFuture<'a, Result<Package>>;

    /// Store a new package. Returns the package as stored, with dependency paths filled in.
    fn store<'a>(
        &'a self,
        package: Package,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Package>>;

    /// Merge `update` into the stored package with the same label.
    fn update<'a>(
        &'a self,
        update: PackageUpdate,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Package>>;

    fn remove<'a>(&'a self, label: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Re-import a package from its upstream URL, keeping its label.
    fn refresh<'a>(
        &'a self,
        label: &'a str,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Package>> {
        let name = self.name();
        Box::pin(async move {
            Err(ProjiError::invalid(format!(
                "the {name} package manager cannot refresh '{label}'"
            ))
            .into())
        })
    }
}

/// Build the package manager selected by the configuration.
pub fn from_config(config: &Config) -> Result<Arc<dyn PackageManager>> {
    if let Some(url) = config.server.url.as_deref().filter(|url| !url.trim().is_empty()) {
        tracing::debug!("using remote package manager at {url}");
        return Ok(Arc::new(RemotePackageManager::new(url)?));
    }

    let store = JsonStore::<Package>::open(config.packages_file()?)?;
    let resolver = DependencyResolver::from_config(config)?;
    tracing::debug!("using local package manager");
    Ok(Arc::new(
        LocalPackageManager::new(Arc::new(store), resolver).with_exclude(Some(config.exclude_regex()?)),
    ))
}
