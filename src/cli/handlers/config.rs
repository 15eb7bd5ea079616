//! Settings file handler

use super::super::CliContext;
use crate::config::ConfigManager;
use anyhow::Result;

/// Handler for settings operations
pub struct ConfigHandler<'a> {
    context: &'a CliContext,
}

impl<'a> ConfigHandler<'a> {
    pub fn new(context: &'a CliContext) -> Self {
        Self { context }
    }

    /// Write a default settings file for the operator to fill in
    pub async fn handle_init(&self, force: bool) -> Result<()> {
        let config_path = match &self.context.config_path {
            Some(path) => path.clone(),
            None => ConfigManager::default_config_path()?,
        };

        if config_path.exists() && !force {
            println!("Settings already initialized at: {}", config_path.display());
            println!("Use --force to overwrite");
            return Ok(());
        }

        let written = ConfigManager::init(Some(config_path), force)?;
        println!("Settings initialized at: {}", written.display());
        println!("Edit the [tls] section to point at your certificate and key files.");
        Ok(())
    }
}

super::traits::impl_context_handler!(ConfigHandler<'a>);
