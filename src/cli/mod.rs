//! Command-line interface for proji.
//!
//! Each subcommand lives in its own module and exposes an `execute` method taking the
//! shared [`Session`]. The session owns the loaded configuration and a cancellation
//! token that fires on Ctrl-C, and builds the package and project managers on demand.
//!
//! # Command Overview
//!
//! | Command         | Purpose                                             |
//! |-----------------|-----------------------------------------------------|
//! | `init`          | Create the base directories and default config      |
//! | `new`           | Materialize a package into a new project directory  |
//! | `ls`            | List recorded projects                              |
//! | `show`          | Show one project                                    |
//! | `set`           | Change a project's path, name or description        |
//! | `rm`            | Remove (or purge) a project record                  |
//! | `clean`         | Drop records of projects whose directory vanished   |
//! | `package ...`   | Import, export, list, show, remove, refresh packages |
//!
//! # Examples
//!
//! ```bash
//! proji init
//! proji package import --remote https://github.com/owner/configs/blob/main/go.toml
//! proji new go ./my-service
//! proji ls --all
//! ```

pub mod init;
pub mod package;
pub mod project;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::manager::{self, PackageManager, ProjectManager};
use crate::materializer::ProjectMaterializer;
use crate::models::ProjectRecord;
use crate::store::JsonStore;

/// Root command and its global options.
#[derive(Parser, Debug)]
#[command(
    name = "proji",
    about = "Create projects from reusable packages of directories, templates and plugins",
    version,
    long_about = "proji stores packages (directory skeletons, template files and plugin scripts, \
                  possibly hosted on GitHub or GitLab) and materializes them into new projects."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug output. Mutually exclusive with `--quiet`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file (defaults to `$PROJI_CONFIG` or the user config dir).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the base directories and a default configuration file.
    Init(init::InitCommand),

    /// Create a new project from a stored package.
    New(project::NewCommand),

    /// List recorded projects.
    #[command(alias = "list")]
    Ls(project::ListCommand),

    /// Show a project by id or path.
    Show(project::ShowCommand),

    /// Change a recorded project.
    Set(project::SetCommand),

    /// Remove a project record. Project files are never touched.
    Rm(project::RemoveCommand),

    /// Remove records of projects whose directory no longer exists.
    Clean(project::CleanCommand),

    /// Manage packages.
    #[command(alias = "pkg")]
    Package(package::PackageCommand),
}

impl Cli {
    /// Run the parsed command.
    ///
    /// Installs logging, loads the configuration and wires Ctrl-C to cancellation
    /// before dispatching.
    pub async fn execute(self) -> Result<()> {
        init_logging(self.log_level());

        let config = Config::load(self.config.as_deref()).await?;
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling");
                on_interrupt.cancel();
            }
        });

        let session = Session::new(config, cancel);
        match self.command {
            Commands::Init(cmd) => cmd.execute(&session).await,
            Commands::New(cmd) => cmd.execute(&session).await,
            Commands::Ls(cmd) => cmd.execute(&session),
            Commands::Show(cmd) => cmd.execute(&session),
            Commands::Set(cmd) => cmd.execute(&session),
            Commands::Rm(cmd) => cmd.execute(&session),
            Commands::Clean(cmd) => cmd.execute(&session).await,
            Commands::Package(cmd) => cmd.execute(&session).await,
        }
    }

    /// Log filter directive selected by the verbosity flags.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

/// Install the stderr subscriber. `RUST_LOG` takes precedence over `default_level`.
fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

/// Everything a command needs: configuration, cancellation and the managers built from them.
pub struct Session {
    config: Config,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(config: Config, cancel: CancellationToken) -> Self {
        Self {
            config,
            cancel,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The local or remote package manager, as configured.
    pub fn packages(&self) -> Result<Arc<dyn PackageManager>> {
        manager::from_config(&self.config)
    }

    pub fn projects(&self) -> Result<ProjectManager> {
        let path = self.config.projects_file()?;
        let store = JsonStore::<ProjectRecord>::open(&path)
            .with_context(|| format!("Failed to open project store {}", path.display()))?;
        Ok(ProjectManager::new(Arc::new(store)))
    }

    pub fn materializer(&self) -> Result<ProjectMaterializer> {
        ProjectMaterializer::from_config(&self.config)
    }
}
