//! `proji init`: prepare the base directory.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::Session;

#[derive(Args, Debug)]
pub struct InitCommand {}

impl InitCommand {
    pub async fn execute(self, session: &Session) -> Result<()> {
        let config = session.config();
        config.setup_infrastructure().await?;

        println!("{} proji is ready", "✓".green());
        if let Some(source) = &config.source {
            println!("  config:    {}", source.display());
        }
        println!("  templates: {}", config.templates_dir()?.display());
        println!("  plugins:   {}", config.plugins_dir()?.display());
        Ok(())
    }
}
