use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::hub::HubServer;

/// Validate a configuration file and print what it defines
pub fn check_config(path: &Path) -> Result<()> {
    let config = Config::load(path)
        .with_context(|| format!("Configuration {} is invalid", path.display()))?;

    // Builds the satellite clients too, which catches addresses reqwest rejects
    let server = HubServer::from_config(&config).context("Failed to create hub server")?;

    println!("Configuration {} is valid", path.display());
    println!();
    println!("{}", server.info().display());
    println!("Custom Resources: {}", config.resources.len());
    for resource in &config.resources {
        println!("  {} ({:?})", resource.id, resource.scope);
    }

    Ok(())
}
