//! `proji package`: list, show, import, export, remove and refresh packages.
//!
//! # Examples
//!
//! ```bash
//! proji package import --file ./proji-go.toml
//! proji package import --folder ./skeleton --label sk
//! proji package import --remote gh:owner/configs/blob/main/go.toml
//! proji package import --repo https://gitlab.com/owner/template@v2
//! proji package export go --dir ./exports --format json
//! proji package refresh go
//! ```

use anyhow::Result;
use clap::{ArgGroup, Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use super::Session;
use crate::core::ProjiError;
use crate::models::{Package, validate_label};
use crate::platform::PlatformRegistry;
use crate::portability::{self, ConfigFormat};

#[derive(Args, Debug)]
pub struct PackageCommand {
    #[command(subcommand)]
    command: PackageSubcommands,
}

#[derive(Subcommand, Debug)]
enum PackageSubcommands {
    /// List stored packages.
    #[command(alias = "list")]
    Ls,

    /// Print a stored package as a config file.
    Show {
        label: String,

        #[arg(long, default_value_t = ConfigFormat::Toml)]
        format: ConfigFormat,
    },

    /// Import a package and store it, downloading its remote templates and plugins.
    Import(ImportArgs),

    /// Write a stored package to `<dir>/proji-<label>.<format>`.
    Export {
        label: String,

        #[arg(long, default_value = ".")]
        dir: PathBuf,

        #[arg(long, default_value_t = ConfigFormat::Toml)]
        format: ConfigFormat,
    },

    /// Delete a stored package. Projects created from it are kept.
    Rm { label: String },

    /// Re-import a package from its upstream URL.
    Refresh { label: String },
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).multiple(false)))]
struct ImportArgs {
    /// Local package config file (.toml or .json).
    #[arg(long, group = "source")]
    file: Option<PathBuf>,

    /// Local folder whose layout becomes the package's directory tree.
    #[arg(long, group = "source")]
    folder: Option<PathBuf>,

    /// Package config file hosted on GitHub or GitLab.
    #[arg(long, group = "source")]
    remote: Option<String>,

    /// Repository (or subdirectory) whose tree becomes the package's directory tree.
    #[arg(long, group = "source")]
    repo: Option<String>,

    /// Label to store the package under instead of the imported one.
    #[arg(long)]
    label: Option<String>,

    /// Display name to use instead of the imported one.
    #[arg(long)]
    name: Option<String>,
}

impl PackageCommand {
    pub async fn execute(self, session: &Session) -> Result<()> {
        let packages = session.packages()?;
        match self.command {
            PackageSubcommands::Ls => {
                let mut all = packages.fetch().await?;
                if all.is_empty() {
                    println!("No packages.");
                    return Ok(());
                }
                all.sort_by(|a, b| a.label.cmp(&b.label));
                for package in &all {
                    println!(
                        "{}  {:<24}  {}",
                        format!("{:<16}", package.label).bold(),
                        package.name,
                        package.upstream_url.as_deref().unwrap_or("-")
                    );
                }
            }
            PackageSubcommands::Show {
                label,
                format,
            } => {
                let package = packages.get_by_label(&label).await?;
                print!("{}", portability::encode(&package, format)?);
            }
            PackageSubcommands::Import(args) => {
                let package = args.load(session).await?;
                let stored = packages.store(package, session.cancel()).await?;
                println!(
                    "{} Imported '{}' as {}",
                    "✓".green(),
                    stored.name,
                    stored.label.bold()
                );
            }
            PackageSubcommands::Export {
                label,
                dir,
                format,
            } => {
                let package = packages.get_by_label(&label).await?;
                let path = portability::export_config_file(&package, &dir, format).await?;
                println!("{} Exported '{}' to {}", "✓".green(), label, path.display());
            }
            PackageSubcommands::Rm {
                label,
            } => {
                packages.remove(&label).await?;
                println!("{} Removed package '{}'", "✓".green(), label);
            }
            PackageSubcommands::Refresh {
                label,
            } => {
                let package = packages.refresh(&label, session.cancel()).await?;
                println!(
                    "{} Refreshed '{}' ({})",
                    "✓".green(),
                    package.label,
                    package.sha.as_deref().unwrap_or("no hash")
                );
            }
        }
        Ok(())
    }
}

impl ImportArgs {
    async fn load(self, session: &Session) -> Result<Package> {
        let config = session.config();
        let mut package = if let Some(file) = &self.file {
            portability::import_config_file(file).await?
        } else if let Some(folder) = &self.folder {
            portability::import_folder(folder, Some(&config.exclude_regex()?))?
        } else if let Some(url) = &self.remote {
            let platforms = PlatformRegistry::new(&config.effective_auth())?;
            portability::import_remote_config(&platforms, url, session.cancel()).await?
        } else if let Some(url) = &self.repo {
            let platforms = PlatformRegistry::new(&config.effective_auth())?;
            let exclude = config.exclude_regex()?;
            portability::import_repository(&platforms, url, Some(&exclude), session.cancel())
                .await?
        } else {
            return Err(ProjiError::invalid("nothing to import").into());
        };

        if let Some(label) = self.label {
            validate_label(&label)?;
            package.label = label;
        }
        if let Some(name) = self.name {
            package.name = name;
        }
        Ok(package)
    }
}
