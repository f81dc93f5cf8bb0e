//! Project commands: `new`, `ls`, `show`, `set`, `rm` and `clean`.
//!
//! Projects are addressed either by id or by path. Paths are taken relative to the
//! current directory.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::Session;
use crate::manager::ProjectUpdate;
use crate::models::ProjectRecord;

#[derive(Args, Debug)]
pub struct NewCommand {
    /// Label of the package to build from.
    label: String,

    /// Directory to create. Must not exist yet.
    path: PathBuf,
}

impl NewCommand {
    pub async fn execute(self, session: &Session) -> Result<()> {
        let packages = session.packages()?;
        let materializer = session.materializer()?;
        let projects = session.projects()?;

        let record = projects
            .create(packages.as_ref(), &materializer, &self.label, &self.path, session.cancel())
            .await?;

        println!(
            "{} Created '{}' from package '{}' at {}",
            "✓".green(),
            record.name.bold(),
            record.package,
            record.path.display()
        );
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct ListCommand {
    /// Include removed projects.
    #[arg(short, long)]
    all: bool,
}

impl ListCommand {
    pub fn execute(self, session: &Session) -> Result<()> {
        let records = session.projects()?.fetch(self.all)?;
        if records.is_empty() {
            println!("No projects.");
            return Ok(());
        }
        for record in &records {
            println!("{}", summary_line(record));
        }
        Ok(())
    }
}

fn summary_line(record: &ProjectRecord) -> String {
    let line = format!(
        "{:<36}  {:<16}  {:<8}  {}",
        record.id,
        record.name,
        record.package,
        record.path.display()
    );
    if record.is_live() {
        line
    } else {
        format!("{} {}", line.dimmed(), "(removed)".dimmed())
    }
}

#[derive(Args, Debug)]
pub struct ShowCommand {
    /// Project id or path.
    project: String,
}

impl ShowCommand {
    pub fn execute(self, session: &Session) -> Result<()> {
        let record = session.projects()?.find(&self.project)?;
        println!("{}", record.name.bold());
        println!("  id:          {}", record.id);
        println!("  path:        {}", record.path.display());
        println!("  package:     {}", record.package);
        if let Some(description) = &record.description {
            println!("  description: {description}");
        }
        println!("  created:     {}", record.created_at.to_rfc3339());
        println!("  updated:     {}", record.updated_at.to_rfc3339());
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct SetCommand {
    /// Project id or path.
    project: String,

    /// New location of the project. Files are not moved.
    #[arg(long)]
    path: Option<PathBuf>,

    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    description: Option<String>,
}

impl SetCommand {
    pub fn execute(self, session: &Session) -> Result<()> {
        let projects = session.projects()?;
        let record = projects.find(&self.project)?;
        let updated = projects.update(ProjectUpdate {
            id: record.id,
            path: self.path,
            name: self.name,
            description: self.description,
        })?;
        println!("{} Updated '{}'", "✓".green(), updated.name);
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct RemoveCommand {
    /// Project id or path.
    project: String,

    /// Delete the record entirely instead of marking it removed.
    #[arg(long)]
    purge: bool,
}

impl RemoveCommand {
    pub fn execute(self, session: &Session) -> Result<()> {
        let projects = session.projects()?;
        if self.purge {
            let record = match projects.get(&self.project) {
                Ok(record) => record,
                Err(_) => projects.find(&self.project)?,
            };
            projects.purge(&record.id)?;
            println!("{} Purged '{}'", "✓".green(), record.name);
        } else {
            let record = projects.find(&self.project)?;
            projects.remove(&record.id)?;
            println!("{} Removed '{}'", "✓".green(), record.name);
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct CleanCommand {}

impl CleanCommand {
    pub async fn execute(self, session: &Session) -> Result<()> {
        let cleaned = session.projects()?.clean().await?;
        if cleaned.is_empty() {
            println!("Nothing to clean.");
        }
        for record in cleaned {
            println!("{} Removed '{}' ({} is gone)", "✓".green(), record.name, record.path.display());
        }
        Ok(())
    }
}
